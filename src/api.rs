//! LLM text generation with a bounded retry policy.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`AskFnWrapper`]: wraps the `awful_aj` library's `ask` function
//! - [`RetryAsk`]: decorator that retries any `AskAsync` under a [`RetryPolicy`]
//! - [`Sleeper`]: how the decorator waits between attempts, swappable in tests
//!
//! # Retry Strategy
//!
//! By default a run makes up to 3 attempts, waiting a fixed 10 seconds plus
//! up to 250ms of jitter between them. When every attempt fails the run
//! aborts.

use crate::error::{PostError, Result};
use awful_aj::api::ask;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
///
/// Implementors of this trait can send text to an LLM and receive a response.
/// This abstraction allows for different LLM backends or decorators (like retry logic).
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send text to the LLM and receive a response.
    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn Error>>;
}

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// Named retry configuration, independent of the call it guards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub base_delay: StdDuration,
    pub max_delay: StdDuration,
    pub backoff: Backoff,
    /// Upper bound of the random delay added to each wait.
    pub max_jitter: StdDuration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: usize, delay: StdDuration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: StdDuration::from_secs(30),
            backoff: Backoff::Fixed,
            max_jitter: StdDuration::from_millis(250),
        }
    }

    pub fn exponential(max_attempts: usize, base_delay: StdDuration) -> Self {
        Self {
            backoff: Backoff::Exponential,
            ..Self::fixed(max_attempts, base_delay)
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.max_jitter = StdDuration::ZERO;
        self
    }

    /// Delay after the `attempt`-th failure (1-based), before jitter.
    ///
    /// ```text
    /// fixed:       min(base, max)
    /// exponential: min(base * 2^(attempt-1), max)
    /// ```
    pub fn delay_for(&self, attempt: usize) -> StdDuration {
        let delay = match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(31) as u32;
                self.base_delay.saturating_mul(1u32 << shift)
            }
        };
        delay.min(self.max_delay)
    }

    fn jitter(&self) -> StdDuration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return StdDuration::ZERO;
        }
        StdDuration::from_millis(rng().random_range(0..=max_ms))
    }
}

impl<T: AskAsync> AskAsync for &T {
    type Response = T::Response;

    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn Error>> {
        (**self).ask(text).await
    }
}

/// How [`RetryAsk`] waits between attempts.
pub trait Sleeper {
    async fn sleep(&self, delay: StdDuration);
}

impl<S: Sleeper> Sleeper for &S {
    async fn sleep(&self, delay: StdDuration) {
        (**self).sleep(delay).await;
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: StdDuration) {
        tokio::time::sleep(delay).await;
    }
}

/// Wrapper that adds bounded retries to any [`AskAsync`] implementation.
pub struct RetryAsk<T, S = TokioSleeper> {
    /// The underlying LLM client to wrap.
    inner: T,
    policy: RetryPolicy,
    sleeper: S,
}

impl<T, S> RetryAsk<T, S>
where
    T: AskAsync,
    S: Sleeper,
{
    pub fn with_sleeper(inner: T, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            inner,
            policy,
            sleeper,
        }
    }
}

impl<T, S> fmt::Debug for RetryAsk<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T, S> AskAsync for RetryAsk<T, S>
where
    T: AskAsync,
    S: Sleeper,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt >= self.policy.max_attempts {
                        error!(
                            attempt,
                            max = self.policy.max_attempts,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_for(attempt) + self.policy.jitter();
                    warn!(
                        attempt,
                        max = self.policy.max_attempts,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    self.sleeper.sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    /// Reference to the LLM configuration (API keys, endpoints, model settings).
    pub config: &'a AwfulJadeConfig,
    /// Reference to the chat template defining the conversation structure.
    pub template: &'a ChatTemplate,
}

impl<'a> AskAsync for AskFnWrapper<'a> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> std::result::Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        let dt = t0.elapsed();

        if let Err(e) = &res {
            warn!(elapsed_ms = dt.as_millis() as u64, error = %e, "API call failed");
        }
        res
    }
}

/// Send a prompt through `client` under `policy`, turning exhaustion into
/// [`PostError::GenerationFailure`].
#[instrument(level = "info", skip_all, fields(max_attempts = policy.max_attempts))]
pub async fn ask_with_retry<T, S>(
    client: T,
    policy: &RetryPolicy,
    sleeper: S,
    prompt: &str,
) -> Result<String>
where
    T: AskAsync<Response = String>,
    S: Sleeper,
{
    let t0 = Instant::now();
    let api = RetryAsk::with_sleeper(client, policy.clone(), sleeper);
    let res = api.ask(prompt).await;
    let dt = t0.elapsed();

    match res {
        Ok(text) => {
            info!(
                elapsed_ms_total = dt.as_millis() as u64,
                chars = text.chars().count(),
                "ask_with_retry succeeded"
            );
            Ok(text)
        }
        Err(e) => Err(PostError::GenerationFailure {
            attempts: policy.max_attempts,
            last_error: e.to_string(),
        }),
    }
}

/// A generation client bundled with the retry policy it runs under.
#[derive(Debug)]
pub struct Generator<T, S = TokioSleeper> {
    client: T,
    policy: RetryPolicy,
    sleeper: S,
}

impl<T, S> Generator<T, S>
where
    T: AskAsync<Response = String>,
    S: Sleeper,
{
    pub fn new(client: T, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            client,
            policy,
            sleeper,
        }
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        ask_with_retry(&self.client, &self.policy, &self.sleeper, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Fails `failures` times, then answers.
    struct Flaky {
        failures: usize,
        calls: Cell<usize>,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> std::result::Result<String, Box<dyn Error>> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.failures {
                Err(format!("upstream 503 on call {n}").into())
            } else {
                Ok(format!("echo: {text}"))
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        waits: RefCell<Vec<StdDuration>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: StdDuration) {
            self.waits.borrow_mut().push(delay);
        }
    }

    fn flaky(failures: usize) -> Flaky {
        Flaky {
            failures,
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_fixed_delay_is_constant_and_capped() {
        let policy = RetryPolicy::fixed(3, StdDuration::from_secs(10));
        assert_eq!(policy.delay_for(1), StdDuration::from_secs(10));
        assert_eq!(policy.delay_for(5), StdDuration::from_secs(10));

        let capped = RetryPolicy::fixed(3, StdDuration::from_secs(60));
        assert_eq!(capped.delay_for(1), StdDuration::from_secs(30));
    }

    #[test]
    fn test_exponential_delay_doubles_until_cap() {
        let policy = RetryPolicy::exponential(6, StdDuration::from_secs(1));
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay_for(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30]);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::fixed(3, StdDuration::from_secs(10)).without_jitter();
        let client = flaky(2);

        let out = ask_with_retry(&client, &policy, &sleeper, "hi").await.unwrap();
        assert_eq!(out, "echo: hi");
        assert_eq!(client.calls.get(), 3);
        assert_eq!(*sleeper.waits.borrow(), vec![StdDuration::from_secs(10); 2]);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::fixed(3, StdDuration::from_secs(1)).without_jitter();
        let client = flaky(10);

        let err = ask_with_retry(&client, &policy, &sleeper, "hi").await.unwrap_err();
        assert!(matches!(err, PostError::GenerationFailure { attempts: 3, .. }));
        assert!(err.to_string().contains("upstream 503 on call 3"));
        assert_eq!(client.calls.get(), 3);
        assert_eq!(sleeper.waits.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_single_attempt_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::fixed(1, StdDuration::from_secs(1));
        let client = flaky(1);

        assert!(ask_with_retry(&client, &policy, &sleeper, "hi").await.is_err());
        assert!(sleeper.waits.borrow().is_empty());
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy::fixed(3, StdDuration::from_secs(1));
        for _ in 0..50 {
            assert!(policy.jitter() <= StdDuration::from_millis(250));
        }
        assert_eq!(policy.without_jitter().jitter(), StdDuration::ZERO);
    }
}
