//! Background scan worker and its shared progress state.
//!
//! The worker owns an immutable snapshot of its inputs and communicates
//! with the owning thread only through [`ScanProgress`] behind one coarse
//! mutex. It never touches the catalog directly.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread::JoinHandle,
};

use log::{debug, info};

use crate::file_discovery;
use crate::song::Song;
use crate::tag_reader;

/// Cross-thread scan state: candidate total, completed count, and the
/// outbox of extracted songs awaiting drain.
#[derive(Debug, Default)]
pub struct ScanProgress {
    /// Total candidate file count; `None` until the walk has finished.
    pub total: Option<usize>,
    /// Files processed so far, counting unrecognized files as done.
    pub completed: usize,
    /// Extracted songs not yet drained by the owning thread.
    pub results: Vec<Song>,
}

pub type SharedScanProgress = Arc<Mutex<ScanProgress>>;

/// Immutable worker inputs captured when the scan is requested.
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    /// Root folders to walk.
    pub folders: Vec<PathBuf>,
    /// Extension allow-list.
    pub extensions: Vec<String>,
    /// Absolute paths already present in the catalog.
    pub existing_files: HashSet<String>,
}

/// Spawns the scan worker thread over the given snapshot.
///
/// The caller must have reset `shared` to its unset state first.
pub fn spawn_scan_worker(snapshot: ScanSnapshot, shared: SharedScanProgress) -> JoinHandle<()> {
    std::thread::spawn(move || run_scan(snapshot, shared))
}

fn run_scan(snapshot: ScanSnapshot, shared: SharedScanProgress) {
    let candidates = file_discovery::collect_candidate_files(
        &snapshot.folders,
        &snapshot.extensions,
        &snapshot.existing_files,
    );
    info!("Library scan found {} candidate file(s)", candidates.len());

    {
        let mut progress = shared.lock().expect("scan progress lock poisoned");
        progress.total = Some(candidates.len());
    }

    for path in candidates {
        let song = tag_reader::read_song(&path);
        if song.is_none() {
            debug!("Skipping unrecognized file {}", path.display());
        }

        let mut progress = shared.lock().expect("scan progress lock poisoned");
        if let Some(song) = song {
            progress.results.push(song);
        }
        progress.completed += 1;
    }
}
