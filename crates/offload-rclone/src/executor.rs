//! [`TransferExecutor`] backed by the rclone command line.
//!
//! # Design
//! - Every call spawns its own rclone process, so calls are independent and
//!   safe to run concurrently; the engine bounds how many run at once.
//! - A copy that exceeds its budget is killed and reported as timed out.
//! - A check that exceeds its budget counts as a mismatch.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use offload_core::{AdapterResult, TransferExecutor, TransferOutcome, VerifyOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::RcloneConfig;
use crate::error::{RcloneError, RcloneResult};
use crate::locate::locate_binary;

const LISTREMOTES_TIMEOUT: Duration = Duration::from_secs(30);
const STDERR_TAIL_LINES: usize = 20;
const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Runs `rclone copy` and `rclone check` against a configured remote.
#[derive(Debug, Clone)]
pub struct RcloneExecutor {
    config: RcloneConfig,
    binary: Option<PathBuf>,
}

impl RcloneExecutor {
    /// Build an executor, resolving the rclone binary up front.
    ///
    /// A missing binary is logged here and reported by
    /// [`TransferExecutor::health_check`] and every later call.
    #[must_use]
    pub fn new(config: RcloneConfig) -> Self {
        let binary = match locate_binary(config.binary.as_deref()) {
            Ok(binary) => Some(binary),
            Err(err) => {
                error!(error = %err, "rclone executable not found; install rclone or set rclone.binary");
                None
            }
        };
        Self { config, binary }
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &RcloneConfig {
        &self.config
    }

    fn binary(&self) -> RcloneResult<&Path> {
        self.binary.as_deref().ok_or_else(|| RcloneError::BinaryNotFound {
            searched: self.config.binary.iter().cloned().collect(),
        })
    }

    fn command(&self, operation: &'static str) -> RcloneResult<(Command, PathBuf)> {
        let binary = self.binary()?.to_path_buf();
        let mut command = Command::new(&binary);
        command.stdin(Stdio::null()).kill_on_drop(true);
        debug!(operation, binary = %binary.display(), "preparing rclone command");
        Ok((command, binary))
    }

    /// Remotes reported by `rclone listremotes`, including the trailing colon.
    ///
    /// # Errors
    ///
    /// Returns an error if rclone cannot be run or exits unsuccessfully.
    pub async fn list_remotes(&self) -> RcloneResult<Vec<String>> {
        const OPERATION: &str = "rclone.listremotes";
        let (mut command, binary) = self.command(OPERATION)?;
        command.arg("listremotes");
        let output = tokio::time::timeout(LISTREMOTES_TIMEOUT, command.output())
            .await
            .map_err(|_| RcloneError::TimedOut {
                operation: OPERATION,
                after_secs: LISTREMOTES_TIMEOUT.as_secs(),
            })?
            .map_err(|source| RcloneError::Spawn {
                operation: OPERATION,
                binary,
                source,
            })?;
        if !output.status.success() {
            return Err(RcloneError::CommandFailed {
                operation: OPERATION,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn copy(&self, local_path: &Path, target: &str) -> RcloneResult<TransferOutcome> {
        const OPERATION: &str = "rclone.copy";
        let (mut command, binary) = self.command(OPERATION)?;
        command
            .arg("copy")
            .arg(local_path)
            .arg(target)
            .args(["--stats=15s", "--stats-one-line", "--stats-log-level", "NOTICE"])
            .arg("--retries")
            .arg(self.config.retries.to_string())
            .arg("--low-level-retries")
            .arg(self.config.low_level_retries.to_string())
            .arg("--transfers")
            .arg(self.config.transfers.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| RcloneError::Spawn {
            operation: OPERATION,
            binary,
            source,
        })?;
        let mut progress = ProgressLog::new(self.config.progress_interval);

        let status = match self.config.transfer_timeout {
            Some(limit) => {
                let finished = tokio::time::timeout(limit, drive(&mut child, &mut progress)).await;
                match finished {
                    Ok(status) => status,
                    Err(_) => {
                        if let Err(err) = child.kill().await {
                            warn!(error = %err, "failed to kill timed out rclone copy");
                        }
                        warn!(target, timeout_secs = limit.as_secs(), "rclone copy timed out");
                        return Ok(TransferOutcome::TimedOut { after: limit });
                    }
                }
            }
            None => drive(&mut child, &mut progress).await,
        }
        .map_err(|source| RcloneError::Io {
            operation: OPERATION,
            source,
        })?;

        if status.success() {
            info!(target, "upload finished");
            return Ok(TransferOutcome::Completed);
        }
        let message = exit_message("rclone copy", status, &progress.tail());
        error!(target, %message, "upload failed");
        Ok(TransferOutcome::Failed { message })
    }

    async fn check(&self, local_path: &Path, target: &str) -> RcloneResult<VerifyOutcome> {
        const OPERATION: &str = "rclone.check";
        let (mut command, binary) = self.command(OPERATION)?;
        command
            .arg("check")
            .arg(local_path)
            .arg(target)
            .arg("--one-way");
        if !self.config.use_full_hash {
            command.arg("--size-only");
        }

        let limit = self.config.verification_timeout;
        let Ok(output) = tokio::time::timeout(limit, command.output()).await else {
            warn!(target, timeout_secs = limit.as_secs(), "verification timed out");
            return Ok(VerifyOutcome::Mismatch {
                details: format!("verification timed out after {}s", limit.as_secs()),
            });
        };
        let output = output.map_err(|source| RcloneError::Spawn {
            operation: OPERATION,
            binary,
            source,
        })?;

        if output.status.success() {
            info!(target, "upload verified");
            return Ok(VerifyOutcome::Match);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let details = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let details = exit_message("rclone check", output.status, &details);
        error!(target, %details, "verification failed");
        Ok(VerifyOutcome::Mismatch { details })
    }
}

#[async_trait]
impl TransferExecutor for RcloneExecutor {
    async fn transfer(
        &self,
        local_path: &Path,
        remote_subpath: &str,
    ) -> AdapterResult<TransferOutcome> {
        let target = self.config.remote_target(remote_subpath);
        info!(local = %local_path.display(), %target, "starting upload");
        log_content_size(local_path).await;
        Ok(self.copy(local_path, &target).await?)
    }

    async fn verify(&self, local_path: &Path, remote_subpath: &str) -> AdapterResult<VerifyOutcome> {
        if !self.config.verify_uploads {
            info!("upload verification disabled");
            return Ok(VerifyOutcome::Match);
        }
        let target = self.config.remote_target(remote_subpath);
        info!(local = %local_path.display(), %target, "verifying upload");
        Ok(self.check(local_path, &target).await?)
    }

    async fn health_check(&self) -> AdapterResult<()> {
        let remotes = self.list_remotes().await?;
        let wanted = format!("{}:", self.config.remote_name);
        if remotes.iter().any(|remote| *remote == wanted) {
            info!(remote = %self.config.remote_name, "rclone remote configured");
            return Ok(());
        }
        Err(RcloneError::RemoteMissing {
            remote: self.config.remote_name.clone(),
            available: remotes,
        }
        .into())
    }
}

/// Stream stderr into `progress` until EOF, then reap the process.
async fn drive(child: &mut Child, progress: &mut ProgressLog) -> io::Result<ExitStatus> {
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await? {
            progress.observe(&line);
        }
    }
    child.wait().await
}

fn exit_message(command: &str, status: ExitStatus, output: &str) -> String {
    let code = status
        .code()
        .map_or_else(|| "a signal".to_string(), |code| format!("code {code}"));
    if output.is_empty() {
        format!("{command} exited with {code}")
    } else {
        format!("{command} exited with {code}: {output}")
    }
}

/// Rate-limited progress logging plus a short tail of other output.
#[derive(Debug)]
struct ProgressLog {
    interval: Duration,
    last_logged: Instant,
    tail: VecDeque<String>,
}

impl ProgressLog {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_logged: Instant::now(),
            tail: VecDeque::with_capacity(STDERR_TAIL_LINES),
        }
    }

    /// Returns `true` when the line was logged as progress.
    fn observe(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        if line.contains("Transferred:") {
            if self.last_logged.elapsed() >= self.interval {
                info!(progress = line, "upload progress");
                self.last_logged = Instant::now();
                return true;
            }
            return false;
        }
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
        false
    }

    fn tail(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

async fn log_content_size(path: &Path) {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || content_size(&owned)).await {
        Ok(Ok((bytes, kind))) => {
            #[allow(clippy::cast_precision_loss)]
            let mib = bytes as f64 / BYTES_PER_MIB;
            info!(kind, size_mib = %format!("{mib:.2}"), "uploading content");
        }
        Ok(Err(err)) => warn!(path = %path.display(), error = %err, "could not measure content size"),
        Err(err) => warn!(path = %path.display(), error = %err, "size measurement task failed"),
    }
}

/// Total size in bytes of a file or directory tree, with its kind.
fn content_size(path: &Path) -> io::Result<(u64, &'static str)> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        return Ok((metadata.len(), "file"));
    }
    let mut total = 0_u64;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(io::Error::other)?.len();
        }
    }
    Ok((total, "directory"))
}
