// Audit logger - append-only, hash-chained JSON Lines
//
// Every processed request becomes one JSON object on its own line in
// audit_YYYY-MM-DD.jsonl. Each entry records the SHA-256 of the previously
// written line, so any edit, reorder or deletion inside a file breaks the
// chain from that point on. Entries can additionally carry an Ed25519
// signature over a canonical projection (see signer.rs).
//
// Two write paths funnel into the same committed section:
// - log():      best-effort, non-blocking; entries go through a bounded
//               queue drained by a single background task
// - log_sync(): caller blocks and sees the write error
// The chain is advanced in commit order under one lock, so concurrent
// submitters may interleave but every line's previousEntryHash is exact.

mod signer;

pub use signer::Signer;

use crate::model::{Action, AuditEntry, Violation};
use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Depth of the async write queue; overflow drops entries with a warning
const QUEUE_DEPTH: usize = 1024;

struct WriterState {
    file: File,
    /// SHA-256 of the last serialized line; empty string seeds the chain
    last_entry_hash: String,
}

struct LoggerCore {
    log_dir: PathBuf,
    sign_entries: bool,
    signer: Option<Signer>,
    retention_days: u32,
    state: Mutex<WriterState>,
}

/// The audit logger handle held by the orchestrator
pub struct Logger {
    core: Arc<LoggerCore>,
    queue: mpsc::Sender<AuditEntry>,
    worker: tokio::task::JoinHandle<()>,
}

impl Logger {
    /// Open (or create) today's log file under `log_dir` and start the
    /// background writer. Must be called inside a tokio runtime.
    pub fn new(log_dir: impl Into<PathBuf>, sign_entries: bool, retention_days: u32) -> Result<Self> {
        let log_dir = log_dir.into();
        create_log_dir(&log_dir)?;
        let file = open_log_file(&log_dir)?;

        let core = Arc::new(LoggerCore {
            log_dir,
            sign_entries,
            signer: sign_entries.then(Signer::new),
            retention_days,
            state: Mutex::new(WriterState {
                file,
                last_entry_hash: String::new(),
            }),
        });

        let (queue, mut rx) = mpsc::channel::<AuditEntry>(QUEUE_DEPTH);
        let writer = Arc::clone(&core);
        let worker = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(err) = writer.log_entry(entry) {
                    tracing::error!(error = %err, "failed to write audit entry");
                }
            }
        });

        Ok(Self { core, queue, worker })
    }

    /// Queue an entry for writing; never blocks request processing
    pub fn log(&self, entry: AuditEntry) {
        if self.queue.try_send(entry).is_err() {
            tracing::warn!("audit queue full, dropping entry");
        }
    }

    /// Write an entry before returning
    /// Used by: hosts that need the write error on the request path
    #[allow(dead_code)]
    pub fn log_sync(&self, entry: AuditEntry) -> Result<()> {
        self.core.log_entry(entry)
    }

    /// Build an entry for a processed request
    pub fn create_entry(
        &self,
        user_id: &str,
        session_id: &str,
        department: &str,
        provider: &str,
        was_sanitized: bool,
        violations: Vec<Violation>,
        action: Action,
        processing_time_ms: u64,
    ) -> AuditEntry {
        AuditEntry {
            entry_id: generate_entry_id(),
            timestamp: Utc::now(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            department: department.to_string(),
            provider: provider.to_string(),
            request_hash: String::new(),
            response_hash: None,
            was_sanitized,
            violations,
            action,
            processing_time_ms,
            signature: None,
            previous_entry_hash: String::new(),
        }
    }

    /// Re-open today's file; call at day rollover
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.core.state.lock().unwrap();
        state.file = open_log_file(&self.core.log_dir)?;
        Ok(())
    }

    /// Remove log files whose mtime is past the retention window
    pub fn cleanup_old_logs(&self) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.core.retention_days));
        let mut removed = 0;

        for dir_entry in fs::read_dir(&self.core.log_dir).context("failed to read log directory")? {
            let dir_entry = dir_entry?;
            let metadata = dir_entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified: chrono::DateTime<Utc> = match metadata.modified() {
                Ok(time) => time.into(),
                Err(_) => continue,
            };
            if modified < cutoff && fs::remove_file(dir_entry.path()).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Drain the queue, stop the writer and flush to disk
    pub async fn shutdown(self) -> Result<()> {
        // Dropping the sender lets the worker drain whatever is queued
        drop(self.queue);
        let _ = self.worker.await;
        let mut state = self.core.state.lock().unwrap();
        state.file.flush().context("failed to flush audit log")
    }

    /// The signer, when entry signing is enabled
    /// Used by: verification tooling checking a log against the public key
    #[allow(dead_code)]
    pub fn signer(&self) -> Option<&Signer> {
        self.core.signer.as_ref()
    }
}

impl LoggerCore {
    /// The committed section: fill derived fields, link the chain, sign,
    /// append. Everything happens under the writer lock so the chain is
    /// advanced strictly in commit order.
    fn log_entry(&self, mut entry: AuditEntry) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        if entry.entry_id.is_empty() {
            entry.entry_id = generate_entry_id();
        }
        if entry.request_hash.is_empty() {
            entry.request_hash = sha256_hex(&format!(
                "{}{}{}",
                entry.entry_id,
                entry.user_id,
                entry.timestamp.to_rfc3339()
            ));
        }
        entry.previous_entry_hash = state.last_entry_hash.clone();

        if self.sign_entries {
            if let Some(signer) = &self.signer {
                match signer.sign(&entry) {
                    Ok(signature) => entry.signature = Some(signature),
                    // A failed signature degrades the entry, not the log
                    Err(err) => tracing::warn!(error = %err, "audit entry written unsigned"),
                }
            }
        }

        let line = serde_json::to_string(&entry).context("failed to serialize audit entry")?;
        writeln!(state.file, "{}", line).context("failed to write audit entry")?;
        state.file.flush().context("failed to flush audit log")?;

        // Only a committed line advances the chain
        state.last_entry_hash = sha256_hex(&line);
        Ok(())
    }
}

/// Entry IDs look like "audit_9f2c04d1ab37"
fn generate_entry_id() -> String {
    let suffix: u64 = rand::thread_rng().gen();
    format!("audit_{:012x}", suffix & 0xFFFF_FFFF_FFFF)
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("audit_{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

#[cfg(unix)]
fn create_log_dir(log_dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(log_dir)
        .context("failed to create log directory")
}

#[cfg(not(unix))]
fn create_log_dir(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir).context("failed to create log directory")
}

fn open_log_file(log_dir: &Path) -> Result<File> {
    let path = log_file_path(log_dir);
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry_for(logger: &Logger, user: &str) -> AuditEntry {
        logger.create_entry(user, "sess_0", "eng", "openai", true, vec![], Action::AllowWithSanitization, 5)
    }

    fn read_lines(dir: &Path) -> Vec<String> {
        let contents = fs::read_to_string(log_file_path(dir)).unwrap();
        contents.lines().map(String::from).collect()
    }

    #[tokio::test]
    async fn test_chain_links_consecutive_entries() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false, 365).unwrap();

        for user in ["a@x", "b@x", "c@x"] {
            logger.log_sync(entry_for(&logger, user)).unwrap();
        }

        let lines = read_lines(dir.path());
        assert_eq!(lines.len(), 3);

        let first: AuditEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.previous_entry_hash, "");

        for window in lines.windows(2) {
            let next: AuditEntry = serde_json::from_str(&window[1]).unwrap();
            assert_eq!(next.previous_entry_hash, sha256_hex(&window[0]));
        }
    }

    #[tokio::test]
    async fn test_signatures_verify_against_logger_key() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), true, 365).unwrap();

        logger.log_sync(entry_for(&logger, "a@x")).unwrap();
        logger.log_sync(entry_for(&logger, "b@x")).unwrap();

        let signer = logger.signer().unwrap();
        for line in read_lines(dir.path()) {
            let entry: AuditEntry = serde_json::from_str(&line).unwrap();
            let signature = entry.signature.clone().unwrap();
            assert!(signer.verify(&entry, &signature));
        }
    }

    #[tokio::test]
    async fn test_derived_fields_filled_on_write() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false, 365).unwrap();

        let mut entry = entry_for(&logger, "a@x");
        entry.entry_id = String::new();
        entry.request_hash = String::new();
        logger.log_sync(entry).unwrap();

        let written: AuditEntry = serde_json::from_str(&read_lines(dir.path())[0]).unwrap();
        assert!(written.entry_id.starts_with("audit_"));
        assert_eq!(written.entry_id.len(), "audit_".len() + 12);
        assert_eq!(written.request_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_async_path_drains_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false, 365).unwrap();

        let first = entry_for(&logger, "a@x");
        let second = entry_for(&logger, "b@x");
        logger.log(first);
        logger.log(second);
        logger.shutdown().await.unwrap();

        let lines = read_lines(dir.path());
        assert_eq!(lines.len(), 2);
        // The chain holds across the async path too
        let last: AuditEntry = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(last.previous_entry_hash, sha256_hex(&lines[0]));
    }

    #[tokio::test]
    async fn test_cleanup_removes_files_past_retention() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false, 0).unwrap();

        let stale = dir.path().join("audit_2020-01-01.jsonl");
        fs::write(&stale, "{}\n").unwrap();

        // Retention of zero days makes everything stale
        assert!(logger.cleanup_old_logs().unwrap() >= 1);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_rotate_reopens_todays_file() {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new(dir.path(), false, 365).unwrap();

        logger.log_sync(entry_for(&logger, "a@x")).unwrap();
        logger.rotate().unwrap();
        logger.log_sync(entry_for(&logger, "b@x")).unwrap();

        // Same day: rotation appends to the same file without losing lines
        assert_eq!(read_lines(dir.path()).len(), 2);
    }
}
