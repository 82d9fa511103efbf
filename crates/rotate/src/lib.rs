//! Rotating append file
//!
//! [`RotatingFile`] is an `io::Write` over a single append-only file with
//! size-triggered rotation. On rotation the current file is renamed to a
//! timestamped backup next to it and, when compression is on, re-encoded as
//! an LZ4 frame (`.lz4`). Backups are pruned by count and by age.
//!
//! ```text
//! logs/nginx.log
//! logs/nginx-20190524T205430123.log.lz4
//! logs/nginx-20190524T193001557.log.lz4
//! ```
//!
//! Writes never fail because of a backup problem: rotation errors are
//! logged and the writer reopens a fresh live file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use lz4_flex::frame::FrameEncoder;
use tracing::{debug, warn};

/// Rotation knobs. Defaults match the agent's file flags: 10 MB segments,
/// 5 backups, 30 days.
#[derive(Debug, Clone, Copy)]
pub struct RotateConfig {
    /// Live-file size triggering rotation, in bytes.
    pub max_size: u64,
    /// Rotated segments to retain; older ones are deleted.
    pub max_backups: usize,
    /// Segments older than this many days are deleted; 0 disables.
    pub max_age_days: u32,
    /// LZ4-compress rotated segments.
    pub compress: bool,
}

impl Default for RotateConfig {
    fn default() -> Self {
        RotateConfig {
            max_size: 10 * 1024 * 1024,
            max_backups: 5,
            max_age_days: 30,
            compress: true,
        }
    }
}

/// Append writer with size/count/age-bounded rotation.
pub struct RotatingFile {
    path: PathBuf,
    config: RotateConfig,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    /// Open (or create) the live file in append mode. Parent directories
    /// are created as needed.
    pub fn open(path: impl Into<PathBuf>, config: RotateConfig) -> io::Result<RotatingFile> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(RotatingFile {
            path,
            config,
            file: Some(file),
            written,
        })
    }

    /// Current live-file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and release the live file. Further writes reopen it.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
            self.written = file.metadata()?.len();
            self.file = Some(file);
        }
        Ok(self.file.as_mut().expect("file just opened"))
    }

    /// Move the live file aside as a timestamped backup, compress it when
    /// configured, prune old backups and start a fresh live file.
    fn rotate(&mut self) -> io::Result<()> {
        self.close()?;

        let backup = self.backup_path();
        fs::rename(&self.path, &backup)?;
        debug!(live = %self.path.display(), backup = %backup.display(), "rotated log file");

        if self.config.compress {
            if let Err(e) = compress_segment(&backup) {
                warn!(path = %backup.display(), error = %e, "failed to compress rotated segment");
            }
        }
        if let Err(e) = self.prune_backups() {
            warn!(path = %self.path.display(), error = %e, "failed to prune backups");
        }

        self.ensure_open()?;
        Ok(())
    }

    /// Next free `<stem>-<timestamp>.<ext>` name next to the live file.
    fn backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        let ext = self
            .path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_string());
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
        let mut candidate = dir.join(format!("{stem}-{stamp}.{ext}"));
        let mut n = 1;
        while candidate.exists() || candidate.with_extension(format!("{ext}.lz4")).exists() {
            candidate = dir.join(format!("{stem}-{stamp}-{n}.{ext}"));
            n += 1;
        }
        candidate
    }

    /// Drop backups beyond the count budget and older than the age budget.
    fn prune_backups(&self) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = format!("{stem}-");

        let mut backups: Vec<(PathBuf, SystemTime)> = Vec::new();
        for dent in fs::read_dir(dir)? {
            let dent = dent?;
            let name = dent.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) {
                continue;
            }
            let modified = dent
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            backups.push((dent.path(), modified));
        }

        // newest first
        backups.sort_by(|a, b| b.1.cmp(&a.1));

        for (i, (path, modified)) in backups.iter().enumerate() {
            let too_many = i >= self.config.max_backups;
            let too_old = self.config.max_age_days > 0
                && modified
                    .elapsed()
                    .unwrap_or(Duration::ZERO)
                    .as_secs()
                    > u64::from(self.config.max_age_days) * 24 * 3600;
            if too_many || too_old {
                if let Err(e) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove old backup");
                }
            }
        }
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.config.max_size {
            self.rotate()?;
        }
        let file = self.ensure_open()?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for RotatingFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Re-encode a rotated segment as an LZ4 frame and remove the original.
fn compress_segment(path: &Path) -> io::Result<()> {
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = path.with_extension(format!("{ext}.lz4"));

    let mut src = File::open(path)?;
    let mut encoder = FrameEncoder::new(File::create(&target)?);
    io::copy(&mut src, &mut encoder)?;
    encoder.finish().map_err(io::Error::other)?;

    fs::remove_file(path)?;
    debug!(path = %target.display(), "compressed rotated segment");
    Ok(())
}

#[cfg(test)]
#[path = "rotate_test.rs"]
mod rotate_test;
