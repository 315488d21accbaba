use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::asr::recognizer::AsrError;
use crate::protocol::ProgressEvent;

use super::{download, ModelSpec};

const MODEL_ROOT_ENV: &str = "SCRIBE_MODEL_ROOT";

pub fn missing_model_files(spec: &ModelSpec, snapshot_dir: &Path) -> Vec<String> {
    spec.files
        .iter()
        .filter(|file| !snapshot_dir.join(file).exists())
        .map(|file| (*file).to_string())
        .collect()
}

/// Hub cache directory holding one `models--*` folder per repository.
pub fn default_hub_root() -> PathBuf {
    if let Some(root) = std::env::var_os(MODEL_ROOT_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(root);
    }

    let base = dirs_next::cache_dir()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("huggingface").join("hub")
}

pub fn fallback_model_root(spec: &ModelSpec) -> PathBuf {
    default_hub_root().join(spec.cache_dir_name())
}

fn ensure_snapshot_complete(
    spec: &ModelSpec,
    snapshot_dir: PathBuf,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<PathBuf, AsrError> {
    let missing = missing_model_files(spec, &snapshot_dir);
    if missing.is_empty() {
        return Ok(snapshot_dir);
    }

    log::warn!(
        "Model snapshot at {} missing required files ({}). Downloading missing assets.",
        snapshot_dir.display(),
        missing.join(", ")
    );
    download::download_files(&spec.base_url(), &snapshot_dir, &missing, on_progress)?;
    Ok(snapshot_dir)
}

fn newest_snapshot(snapshots: &Path) -> Result<Option<PathBuf>, AsrError> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(snapshots)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        match &newest {
            Some((ts, _)) if modified <= *ts => {}
            _ => newest = Some((modified, entry.path())),
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Finds a usable snapshot of `spec` under `root`, downloading whatever is
/// missing. A download is attempted once; failures are returned as-is.
pub fn resolve_model_dir(
    spec: &ModelSpec,
    root: &Path,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<PathBuf, AsrError> {
    log::debug!("resolve_model_dir: checking root {}", root.display());

    let refs_main = root.join("refs").join("main");
    if refs_main.exists() {
        let commit = fs::read_to_string(&refs_main)?.trim().to_string();
        let snap = root.join("snapshots").join(&commit);
        if snap.is_dir() {
            log::debug!("Using snapshot {} from refs/main", snap.display());
            return ensure_snapshot_complete(spec, snap, on_progress);
        }
        log::warn!("Snapshot {commit} named by refs/main does not exist");
    }

    let snapshots = root.join("snapshots");
    if snapshots.is_dir() {
        if let Some(path) = newest_snapshot(&snapshots)? {
            log::info!("Selected newest snapshot: {}", path.display());
            return ensure_snapshot_complete(spec, path, on_progress);
        }
    }

    log::info!(
        "No local snapshot of {} under {}; downloading",
        spec.id,
        root.display()
    );
    download::download_snapshot(spec, root, on_progress)
}
