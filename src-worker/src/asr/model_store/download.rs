use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::asr::recognizer::AsrError;
use crate::protocol::ProgressEvent;

use super::ModelSpec;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const SNAPSHOT_NAME: &str = "downloaded";

/// Passes progress through only when the whole-percent value changes, plus
/// the first and final tick of each file.
#[derive(Debug, Default)]
pub struct PercentThrottle {
    last: Option<u64>,
}

impl PercentThrottle {
    pub fn should_emit(&mut self, loaded: u64, total: u64) -> bool {
        let percent = if total == 0 {
            0
        } else {
            (loaded.min(total) * 100) / total
        };
        let finished = total > 0 && loaded >= total;
        if self.last == Some(percent) && !finished {
            return false;
        }
        if finished && self.last == Some(100) {
            return false;
        }
        self.last = Some(percent);
        true
    }
}

/// Downloads `files` from `base_url` into `dir`, one attempt each.
pub fn download_files(
    base_url: &str,
    dir: &Path,
    files: &[String],
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<(), AsrError> {
    if files.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AsrError::Download(format!("http client: {e}")))?;

    for file in files {
        let dest = dir.join(file);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let url = format!("{base_url}/{file}");
        if let Err(err) = download_asset(&client, &url, file, &dest, on_progress) {
            log::error!("Model download failed: {err}");
            return Err(err);
        }
    }
    log::info!("Downloaded {} model file(s) into {}", files.len(), dir.display());
    Ok(())
}

pub(crate) fn download_snapshot(
    spec: &ModelSpec,
    root: &Path,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<PathBuf, AsrError> {
    let download_dir = root.join("snapshots").join(SNAPSHOT_NAME);
    fs::create_dir_all(&download_dir)?;

    let missing: Vec<String> = spec
        .files
        .iter()
        .filter(|file| !download_dir.join(file).exists())
        .map(|file| (*file).to_string())
        .collect();
    download_files(&spec.base_url(), &download_dir, &missing, on_progress)?;

    write_refs_main(root, SNAPSHOT_NAME)?;
    Ok(download_dir)
}

fn write_refs_main(root: &Path, snapshot_name: &str) -> Result<(), AsrError> {
    let refs_dir = root.join("refs");
    fs::create_dir_all(&refs_dir)?;
    fs::write(refs_dir.join("main"), snapshot_name)
        .map_err(|e| AsrError::Download(format!("write refs/main: {e}")))
}

fn download_asset(
    client: &reqwest::blocking::Client,
    url: &str,
    file: &str,
    dest: &Path,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<(), AsrError> {
    let tmp = dest.with_extension("download");
    log::info!("Downloading {url} to {}", dest.display());

    let result = fetch_to(client, url, file, &tmp, on_progress);
    match result {
        Ok(()) => {
            fs::rename(&tmp, dest)?;
            Ok(())
        }
        Err(err) => {
            if tmp.exists() {
                let _ = fs::remove_file(&tmp);
            }
            Err(err)
        }
    }
}

fn fetch_to(
    client: &reqwest::blocking::Client,
    url: &str,
    file: &str,
    tmp: &Path,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> Result<(), AsrError> {
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| AsrError::Download(format!("{url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AsrError::Download(format!(
            "{url}: unexpected status {status}"
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut throttle = PercentThrottle::default();
    let mut out = fs::File::create(tmp)?;
    let mut buffer = [0; 8192];

    if throttle.should_emit(0, total_size) {
        on_progress(ProgressEvent::new(file, 0, total_size));
    }

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| AsrError::Download(format!("{url}: read failed: {e}")))?;
        if bytes_read == 0 {
            break;
        }

        out.write_all(&buffer[..bytes_read])
            .map_err(|e| AsrError::Download(format!("{url}: write failed: {e}")))?;

        downloaded += bytes_read as u64;
        if throttle.should_emit(downloaded, total_size) {
            on_progress(ProgressEvent::new(file, downloaded, total_size));
        }
    }

    if total_size > 0 && downloaded != total_size {
        return Err(AsrError::Download(format!(
            "{url}: incomplete download, expected {total_size} bytes, got {downloaded}"
        )));
    }
    out.flush()?;
    Ok(())
}
