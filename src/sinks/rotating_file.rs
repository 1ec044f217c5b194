//! Rotating file sink
//!
//! Writes records to `<dir>/<name>.log`. When a write would push the file
//! past the size limit, the file is renamed to a timestamped backup
//! (`<name>-2025-01-08T10-30-45.123.log`) and a fresh file is opened.
//! Backups older than the age limit, or beyond the backup count, are removed
//! after each rotation. Backups can be gzip-compressed as they are rotated.

use crate::core::{LoggerError, Result, Sink};
use chrono::{Local, NaiveDateTime, TimeZone};
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::ffi::OsString;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const MEGABYTE: u64 = 1024 * 1024;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const BACKUP_STAMP: &str = "%Y-%m-%dT%H-%M-%S%.3f";
const BACKUP_STAMP_LEN: usize = "2025-01-08T10-30-45.123".len();

/// When to rotate and how many backups to keep
///
/// # Examples
///
/// ```
/// use fanout_logger::sinks::RotationPolicy;
///
/// // 100 MB files, backups kept for 7 days
/// let policy = RotationPolicy::new()
///     .with_max_size_mb(100)
///     .with_max_age_days(7);
///
/// assert_eq!(policy.max_bytes, 100 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size that triggers rotation; 0 disables rotation
    pub max_bytes: u64,
    /// Backups rotated out longer ago than this are removed
    pub max_age: Option<Duration>,
    /// Maximum number of backups to keep; 0 keeps all
    pub max_backups: usize,
    /// Gzip backups after rotation
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 100 * MEGABYTE,
            max_age: None,
            max_backups: 0,
            compress: false,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_mb(self, megabytes: u64) -> Self {
        self.with_max_bytes(megabytes.saturating_mul(MEGABYTE))
    }

    /// Remove backups older than `days`; 0 keeps backups regardless of age
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age_days(mut self, days: u64) -> Self {
        self.max_age =
            (days > 0).then(|| DAY.saturating_mul(u32::try_from(days).unwrap_or(u32::MAX)));
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_backups(mut self, count: usize) -> Self {
        self.max_backups = count;
        self
    }

    /// Enable compression
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }
}

struct FileState {
    file: Option<File>,
    current_size: u64,
}

/// Size-rotated log file shared by concurrent writers
///
/// # Examples
///
/// ```no_run
/// use fanout_logger::sinks::{RotatingFileSink, RotationPolicy};
///
/// let sink = RotatingFileSink::with_policy(
///     "/var/log/billing/billing.log",
///     RotationPolicy::new().with_max_size_mb(50).with_max_age_days(14),
/// ).unwrap();
/// ```
pub struct RotatingFileSink {
    base_path: PathBuf,
    policy: RotationPolicy,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    /// Open `path` with the default policy
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_policy(path, RotationPolicy::default())
    }

    /// Open `path`, creating parent directories as needed
    pub fn with_policy<P: AsRef<Path>>(path: P, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let (file, current_size) = Self::open_file(&base_path)?;

        Ok(Self {
            base_path,
            policy,
            state: Mutex::new(FileState {
                file: Some(file),
                current_size,
            }),
        })
    }

    fn open_file(path: &Path) -> Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
            })?;
        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_sink(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();
        Ok((file, size))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.state.lock().current_size
    }

    fn file_parts(&self) -> (String, String) {
        let stem = self
            .base_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("app")
            .to_string();
        let ext = self
            .base_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        (stem, ext)
    }

    fn backup_path(&self) -> PathBuf {
        let (stem, ext) = self.file_parts();
        let stamp = Local::now().format(BACKUP_STAMP);
        let mut candidate = self.base_path.with_file_name(format!("{}-{}{}", stem, stamp, ext));
        let mut n = 1;
        while candidate.exists() || gz_path(&candidate).exists() {
            candidate = self
                .base_path
                .with_file_name(format!("{}-{}.{}{}", stem, stamp, n, ext));
            n += 1;
        }
        candidate
    }

    /// Backups of this file, compressed or not, oldest first.
    ///
    /// Only names this sink produces count: `<stem>-<stamp>[.<n>]<ext>[.gz]`.
    /// Siblings that merely share the stem, such as `app-audit.log`, are
    /// never listed and so never pruned.
    pub fn backups(&self) -> Vec<PathBuf> {
        let dir = match self.base_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut backups: Vec<((NaiveDateTime, u32), PathBuf)> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| *p != self.base_path)
                .filter_map(|p| {
                    let key = p
                        .file_name()
                        .and_then(|n| n.to_str())
                        .and_then(|n| self.parse_backup_name(n))?;
                    Some((key, p))
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        backups.sort();
        backups.into_iter().map(|(_, path)| path).collect()
    }

    /// Rotation stamp and collision counter of a backup name
    fn parse_backup_name(&self, name: &str) -> Option<(NaiveDateTime, u32)> {
        let (stem, ext) = self.file_parts();
        let rest = name.strip_prefix(&format!("{}-", stem))?;
        let rest = rest.strip_suffix(".gz").unwrap_or(rest);
        let rest = rest.strip_suffix(ext.as_str())?;

        let stamp = rest.get(..BACKUP_STAMP_LEN)?;
        let counter = match &rest[stamp.len()..] {
            "" => 0,
            tail => {
                let digits = tail.strip_prefix('.')?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                digits.parse().ok()?
            }
        };

        let rotated = NaiveDateTime::parse_from_str(stamp, BACKUP_STAMP).ok()?;
        Some((rotated, counter))
    }

    /// Rotation time encoded in a backup's name
    fn rotated_at(&self, backup: &Path) -> Option<SystemTime> {
        let name = backup.file_name()?.to_str()?;
        let (naive, _) = self.parse_backup_name(name)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(SystemTime::from)
    }

    fn rotate(&self, state: &mut FileState) -> Result<()> {
        if let Some(mut file) = state.file.take() {
            file.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let backup = self.backup_path();
        fs::rename(&self.base_path, &backup).map_err(|e| {
            LoggerError::file_rotation(
                self.base_path.display().to_string(),
                format!("Failed to rotate current log file: {}", e),
            )
        })?;

        let (file, size) = Self::open_file(&self.base_path)?;
        state.file = Some(file);
        state.current_size = size;

        if self.policy.compress {
            if let Err(e) = compress_file(&backup) {
                eprintln!("[LOGGER WARNING] Keeping uncompressed backup: {}", e);
            }
        }

        self.prune_backups();
        Ok(())
    }

    fn prune_backups(&self) {
        let mut backups = self.backups();

        if let Some(max_age) = self.policy.max_age {
            let now = SystemTime::now();
            backups.retain(|path| {
                let expired = self
                    .rotated_at(path)
                    .and_then(|rotated| now.duration_since(rotated).ok())
                    .is_some_and(|age| age > max_age);
                if expired {
                    if let Err(e) = fs::remove_file(path) {
                        eprintln!("[LOGGER WARNING] Failed to remove expired backup {}: {}", path.display(), e);
                    }
                }
                !expired
            });
        }

        if self.policy.max_backups > 0 && backups.len() > self.policy.max_backups {
            let excess = backups.len() - self.policy.max_backups;
            for path in backups.iter().take(excess) {
                if let Err(e) = fs::remove_file(path) {
                    eprintln!("[LOGGER WARNING] Failed to remove old backup {}: {}", path.display(), e);
                }
            }
        }
    }

    fn write_error(&self, e: std::io::Error) -> LoggerError {
        if e.kind() == ErrorKind::StorageFull {
            LoggerError::storage_exhausted(self.base_path.display().to_string())
        } else {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write log entry: {}", e),
            )
        }
    }
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".gz");
    PathBuf::from(name)
}

/// Gzip `path` next to itself, removing the original only once the archive
/// is complete.
fn compress_file(path: &Path) -> Result<()> {
    let gz = gz_path(path);
    let mut tmp = OsString::from(gz.as_os_str());
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let result = (|| -> std::io::Result<()> {
        let mut reader = BufReader::with_capacity(64 * 1024, File::open(path)?);
        let output = BufWriter::with_capacity(64 * 1024, File::create(&tmp)?);
        let mut encoder = flate2::write::GzEncoder::new(output, flate2::Compression::default());
        std::io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?.flush()?;
        fs::rename(&tmp, &gz)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::remove_file(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to remove {} after compression", path.display()),
            e,
        )
    })
}

impl Sink for RotatingFileSink {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        let incoming = payload.len() as u64;

        if self.policy.max_bytes > 0
            && state.current_size > 0
            && state.current_size + incoming > self.policy.max_bytes
        {
            if let Err(e) = self.rotate(&mut state) {
                eprintln!("[LOGGER WARNING] Log rotation failed: {}. Continuing with current file.", e);
                if state.file.is_none() {
                    let (file, size) = Self::open_file(&self.base_path)?;
                    state.file = Some(file);
                    state.current_size = size;
                }
                // Let the file grow past the limit rather than retry every write
                state.current_size = 0;
            }
        }

        let file = state
            .file
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        file.write_all(payload).map_err(|e| self.write_error(e))?;
        state.current_size += incoming;
        Ok(payload.len())
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(ref mut file) = state.file {
            file.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_rotation_policy_builder() {
        let policy = RotationPolicy::new()
            .with_max_size_mb(2)
            .with_max_age_days(3)
            .with_max_backups(4);

        assert_eq!(policy.max_bytes, 2 * 1024 * 1024);
        assert_eq!(policy.max_age, Some(Duration::from_secs(3 * 24 * 60 * 60)));
        assert_eq!(policy.max_backups, 4);
    }

    #[test]
    fn test_zero_age_keeps_backups() {
        let policy = RotationPolicy::new().with_max_age_days(0);
        assert_eq!(policy.max_age, None);
    }

    #[test]
    fn test_huge_age_saturates() {
        let policy = RotationPolicy::new().with_max_age_days(1 << 32);
        let max_age = policy.max_age.unwrap();

        assert!(max_age >= DAY * u32::MAX);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("nested").join("deeper").join("app.log");

        let sink = RotatingFileSink::new(&log_path).unwrap();

        assert!(log_path.exists());
        assert_eq!(sink.path(), log_path);
        assert_eq!(sink.current_size(), 0);
    }

    #[test]
    fn test_writes_payload_verbatim() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("verbatim.log");
        let sink = RotatingFileSink::new(&log_path).unwrap();

        assert_eq!(sink.write(b"{\"msg\":\"one\"}\n").unwrap(), 14);
        sink.write(b"{\"msg\":\"two\"}\n").unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "{\"msg\":\"one\"}\n{\"msg\":\"two\"}\n");
        assert_eq!(sink.current_size(), 28);
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("existing.log");
        fs::write(&log_path, "previous\n").unwrap();

        let sink = RotatingFileSink::new(&log_path).unwrap();
        sink.write(b"next\n").unwrap();

        assert_eq!(fs::read_to_string(&log_path).unwrap(), "previous\nnext\n");
        assert_eq!(sink.current_size(), 14);
    }

    #[test]
    fn test_size_based_rotation() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("rotation.log");
        let policy = RotationPolicy::new().with_max_bytes(100);
        let sink = RotatingFileSink::with_policy(&log_path, policy).unwrap();

        for i in 0..20 {
            sink.write(format!("Test message number {:02}\n", i).as_bytes())
                .unwrap();
        }

        let backups = sink.backups();
        assert!(!backups.is_empty());
        for backup in &backups {
            let name = backup.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("rotation-") && name.ends_with(".log"), "{}", name);
            assert!(fs::metadata(backup).unwrap().len() <= 100);
        }
        assert!(fs::metadata(&log_path).unwrap().len() <= 100);

        // Nothing lost across rotations
        let mut total = fs::read_to_string(&log_path).unwrap().lines().count();
        for backup in &backups {
            total += fs::read_to_string(backup).unwrap().lines().count();
        }
        assert_eq!(total, 20);
    }

    #[test]
    fn test_max_backups_limit() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("multi.log");
        let policy = RotationPolicy::new().with_max_bytes(30).with_max_backups(2);
        let sink = RotatingFileSink::with_policy(&log_path, policy).unwrap();

        for i in 0..50 {
            sink.write(format!("Entry {:03}\n", i).as_bytes()).unwrap();
        }

        assert!(sink.backups().len() <= 2);
    }

    #[test]
    fn test_expired_backups_are_removed() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("aged.log");
        let policy = RotationPolicy::new()
            .with_max_bytes(10)
            .with_max_age(Duration::from_millis(50));
        let sink = RotatingFileSink::with_policy(&log_path, policy).unwrap();

        sink.write(b"0123456789\n").unwrap();
        sink.write(b"0123456789\n").unwrap();
        assert_eq!(sink.backups().len(), 1);

        thread::sleep(Duration::from_millis(100));
        sink.write(b"0123456789\n").unwrap();

        // The first backup aged out when the second rotation ran
        assert_eq!(sink.backups().len(), 1);
    }

    #[test]
    fn test_rotated_at_reads_backup_name() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("named.log");
        let sink = RotatingFileSink::new(&log_path).unwrap();

        let backup = dir.path().join("named-2025-01-08T10-30-45.123.log");
        let expected = Local
            .with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .unwrap()
            + chrono::Duration::milliseconds(123);

        assert_eq!(sink.rotated_at(&backup), Some(SystemTime::from(expected)));
    }

    #[test]
    fn test_pruning_spares_unrelated_siblings() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("app.log");
        let sibling = dir.path().join("app-audit.log");
        let stale_stamp = dir.path().join("app-2020-01-01T00-00-00.000.log.bak");
        fs::write(&sibling, "audit trail\n").unwrap();
        fs::write(&stale_stamp, "kept\n").unwrap();
        let month_ago = SystemTime::now() - DAY * 30;
        File::options()
            .write(true)
            .open(&sibling)
            .unwrap()
            .set_modified(month_ago)
            .unwrap();

        let policy = RotationPolicy::new()
            .with_max_bytes(10)
            .with_max_age_days(7)
            .with_max_backups(1);
        let sink = RotatingFileSink::with_policy(&log_path, policy).unwrap();
        for _ in 0..4 {
            sink.write(b"0123456789\n").unwrap();
        }

        assert!(sibling.exists());
        assert!(stale_stamp.exists());
        let backups = sink.backups();
        assert_eq!(backups.len(), 1);
        assert!(!backups.contains(&sibling));
        assert_eq!(sink.rotated_at(&sibling), None);
    }

    #[test]
    fn test_backups_sort_by_stamp_then_counter() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("order.log");
        let sink = RotatingFileSink::new(&log_path).unwrap();
        for name in [
            "order-2025-01-08T10-30-45.123.2.log",
            "order-2025-01-08T10-30-45.123.log.gz",
            "order-2025-01-08T10-30-45.123.1.log",
            "order-2024-12-31T23-59-59.999.log",
            "order-2025-01-08T10-30-45.123.x.log",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        let names: Vec<_> = sink
            .backups()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();

        assert_eq!(
            names,
            vec![
                "order-2024-12-31T23-59-59.999.log",
                "order-2025-01-08T10-30-45.123.log.gz",
                "order-2025-01-08T10-30-45.123.1.log",
                "order-2025-01-08T10-30-45.123.2.log",
            ]
        );
    }

    #[test]
    fn test_compressed_backups() {
        use std::io::Read;

        let dir = tempdir().unwrap();
        let log_path = dir.path().join("packed.log");
        let policy = RotationPolicy::new().with_max_bytes(20).with_compression(true);
        let sink = RotatingFileSink::with_policy(&log_path, policy).unwrap();

        sink.write(b"{\"msg\":\"first\"}\n").unwrap();
        sink.write(b"{\"msg\":\"second\"}\n").unwrap();

        let backups = sink.backups();
        assert_eq!(backups.len(), 1);
        let name = backups[0].file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with(".log.gz"), "{}", name);

        let mut decoded = String::new();
        flate2::read::GzDecoder::new(File::open(&backups[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "{\"msg\":\"first\"}\n");
        assert_eq!(
            fs::read_to_string(&log_path).unwrap(),
            "{\"msg\":\"second\"}\n"
        );
    }

    #[test]
    fn test_no_rotation_when_disabled() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("never.log");
        let sink =
            RotatingFileSink::with_policy(&log_path, RotationPolicy::new().with_max_bytes(0))
                .unwrap();

        for i in 0..100 {
            sink.write(format!("Test message number {}\n", i).as_bytes())
                .unwrap();
        }

        assert!(sink.backups().is_empty());
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("concurrent.log");
        let sink = Arc::new(RotatingFileSink::new(&log_path).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..50 {
                        let line = format!("{{\"thread\":{},\"i\":{}}}\n", t, i);
                        sink.write(line.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(&log_path).unwrap();
        assert_eq!(content.lines().count(), 200);
        for line in content.lines() {
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(parsed["thread"].is_u64());
        }
    }
}
