//! systemd-backed host scheduler

use async_trait::async_trait;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::error::{HostCallError, Result};
use super::HostScheduler;
use crate::config::SchedulerConfig;

/// Unit files in a directory plus `systemctl` for registration.
pub struct SystemdHost {
    unit_dir: PathBuf,
    use_sudo: bool,
    timeout: Duration,
}

impl SystemdHost {
    pub fn new(unit_dir: impl Into<PathBuf>, use_sudo: bool, timeout: Duration) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            use_sudo,
            timeout,
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(
            &config.unit_dir,
            config.use_sudo,
            Duration::from_secs(config.command_timeout_secs),
        )
    }

    fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(name)
    }

    fn command_line(&self, args: &[&str]) -> Vec<String> {
        let mut line = Vec::with_capacity(args.len() + 2);
        if self.use_sudo {
            line.push("sudo".to_string());
        }
        line.push("systemctl".to_string());
        line.extend(args.iter().map(|a| a.to_string()));
        line
    }

    /// Run `systemctl` and return whether it exited successfully.
    ///
    /// Spawn failures and timeouts are errors; a non-zero exit is reported
    /// through the returned output so callers can decide what it means.
    async fn systemctl(&self, args: &[&str]) -> Result<std::process::Output> {
        let line = self.command_line(args);
        let rendered = line.join(" ");
        debug!(command = %rendered, "Running host command");

        let mut command = Command::new(&line[0]);
        command
            .args(&line[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(HostCallError::Spawn {
                command: rendered,
                message: e.to_string(),
            }),
            Err(_) => Err(HostCallError::Timeout {
                command: rendered,
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn systemctl_checked(&self, args: &[&str]) -> Result<()> {
        let output = self.systemctl(args).await?;
        if output.status.success() {
            return Ok(());
        }

        Err(HostCallError::Failed {
            command: self.command_line(args).join(" "),
            status: output.status.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn write_atomically(&self, path: &Path, text: &str) -> std::io::Result<()> {
        let mut file = tempfile::NamedTempFile::new_in(&self.unit_dir)?;
        file.write_all(text.as_bytes())?;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl HostScheduler for SystemdHost {
    async fn list_units(&self, prefix: &str) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.unit_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HostCallError::io("list", self.unit_dir.display().to_string(), &e)),
        };

        let mut names = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().to_string();
                    if name.starts_with(prefix) {
                        names.push(name);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    return Err(HostCallError::io(
                        "list",
                        self.unit_dir.display().to_string(),
                        &e,
                    ))
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_unit(&self, name: &str) -> Result<Option<String>> {
        let path = self.unit_path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HostCallError::io("read", path.display().to_string(), &e)),
        }
    }

    async fn write_unit(&self, name: &str, text: &str) -> Result<()> {
        let path = self.unit_path(name);
        self.write_atomically(&path, text)
            .map_err(|e| HostCallError::io("write", path.display().to_string(), &e))
    }

    async fn remove_unit(&self, name: &str) -> Result<()> {
        let path = self.unit_path(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HostCallError::io("remove", path.display().to_string(), &e)),
        }
    }

    async fn reload(&self) -> Result<()> {
        self.systemctl_checked(&["daemon-reload"]).await
    }

    async fn enable(&self, name: &str) -> Result<()> {
        self.systemctl_checked(&["enable", name]).await
    }

    async fn disable(&self, name: &str) -> Result<()> {
        self.systemctl_checked(&["disable", name]).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.systemctl_checked(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.systemctl_checked(&["stop", name]).await
    }

    async fn is_active(&self, name: &str) -> Result<bool> {
        // is-active exits non-zero for inactive and unknown units alike
        let output = self.systemctl(&["is-active", "--quiet", name]).await?;
        Ok(output.status.success())
    }
}
