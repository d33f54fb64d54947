use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use log::debug;

/// True when the path's extension is in the configured allow-list
/// (case-insensitive).
pub fn is_allowed_audio_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Recursively collects candidate audio files under the given roots,
/// skipping paths already present in `existing`. Unreadable directories
/// and entries yield no candidates and do not abort the walk.
pub fn collect_candidate_files(
    roots: &[PathBuf],
    extensions: &[String],
    existing: &HashSet<String>,
) -> Vec<PathBuf> {
    let mut pending_directories: Vec<PathBuf> = roots.to_vec();
    let mut candidates = Vec::new();

    while let Some(directory) = pending_directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(
                        "Failed to read a directory entry in {}: {}",
                        directory.display(),
                        err
                    );
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending_directories.push(path);
                continue;
            }

            if file_type.is_file()
                && is_allowed_audio_file(&path, extensions)
                && !existing.contains(path.to_string_lossy().as_ref())
            {
                candidates.push(path);
            }
        }
    }

    candidates.sort_unstable();
    candidates
}
