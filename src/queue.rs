//! The CSV-backed idea queue.
//!
//! A run claims at most one row: the first row, in file order, whose status
//! is not a done token. The claim is written back to disk (every row, not
//! just the changed one) before the row is used, so a crash during
//! generation never hands the same idea to the next run.
//!
//! There is no file locking. Two overlapping runs that both read before
//! either writes will claim the same row; runs are expected to be
//! serialized by the scheduler.

use crate::config::QueueSettings;
use crate::error::{PostError, Result};
use crate::models::{ClaimStatus, WorkItem, WorkQueue};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Outcome of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Position of the claimed row in the queue.
    pub index: usize,
    /// The claimed row, with its status and claim time already updated.
    pub item: WorkItem,
    /// The whole queue with the claim applied, ready to be persisted.
    pub queue: WorkQueue,
}

/// Select the first unclaimed row and mark it claimed.
///
/// Pure: the input is left untouched and the updated queue is returned in
/// the [`Claim`]. Fails with [`PostError::NotFound`] when every row is done.
pub fn claim_next(queue: &WorkQueue, settings: &QueueSettings, claimed_at: &str) -> Result<Claim> {
    let index = queue
        .items
        .iter()
        .position(|item| {
            item.status(&settings.status_column, &settings.done_tokens) == ClaimStatus::Unclaimed
        })
        .ok_or_else(|| PostError::NotFound(settings.path.display().to_string()))?;

    let mut updated = queue.clone();
    updated.ensure_column(&settings.status_column);
    updated.ensure_column(&settings.claimed_at_column);

    let headers = updated.headers.clone();
    let item = &mut updated.items[index];
    item.pad_to(&headers);
    item.set(&settings.status_column, settings.claimed_token.as_str());
    item.set(&settings.claimed_at_column, claimed_at);
    let item = item.clone();

    debug!(index, "Selected first unclaimed row");
    Ok(Claim {
        index,
        item,
        queue: updated,
    })
}

/// Read the whole queue into memory.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_queue(path: &Path) -> Result<WorkQueue> {
    let store_err = |source| PostError::StoreRead {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(store_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(store_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut items = Vec::new();
    for record in reader.records() {
        let record = record.map_err(store_err)?;
        let mut cells = record.iter();
        let fields = headers
            .iter()
            .zip(cells.by_ref())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        let extra = cells.map(str::to_string).collect();
        items.push(WorkItem { fields, extra });
    }

    info!(rows = items.len(), columns = headers.len(), "Loaded idea queue");
    Ok(WorkQueue { headers, items })
}

/// Rewrite the whole queue: header row, then every row in order.
///
/// Written to a sibling temp file and renamed over the original so a failed
/// write never leaves a truncated queue behind.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn save_queue(path: &Path, queue: &WorkQueue) -> Result<()> {
    let persist_err = |reason: String| PostError::Persistence {
        path: path.to_path_buf(),
        reason,
    };

    let tmp = temp_path(path);
    let written = write_records(&tmp, queue)
        .and_then(|()| fs::rename(&tmp, path).map_err(|e| e.to_string()));
    if let Err(reason) = written {
        let _ = fs::remove_file(&tmp);
        return Err(persist_err(reason));
    }

    info!(rows = queue.items.len(), "Rewrote idea queue");
    Ok(())
}

/// Load the queue, claim the next row and persist the claim before
/// returning the row to the caller.
#[instrument(level = "info", skip_all, fields(path = %settings.path.display()))]
pub fn claim_and_persist(settings: &QueueSettings, claimed_at: &str) -> Result<Claim> {
    let queue = load_queue(&settings.path)?;
    let claim = claim_next(&queue, settings, claimed_at)?;
    save_queue(&settings.path, &claim.queue)?;

    info!(
        index = claim.index,
        name = claim.item.display_name(&settings.name_column).unwrap_or("<unnamed>"),
        "Claimed idea"
    );
    Ok(claim)
}

fn write_records(tmp: &Path, queue: &WorkQueue) -> std::result::Result<(), String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(tmp)
        .map_err(|e| e.to_string())?;
    writer.write_record(&queue.headers).map_err(|e| e.to_string())?;
    for item in &queue.items {
        writer.write_record(queue.row(item)).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
