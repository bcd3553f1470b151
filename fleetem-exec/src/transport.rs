//! Remote command transports.
//!
//! A [`Transport`] runs one argv on one host and reports the outcome. The
//! production implementation shells out to `ssh`; tests substitute scripted
//! transports, which keeps the executor's concurrency and failure-isolation
//! logic testable without a fleet.

use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;

use async_trait::async_trait;

/// Errors from the transport itself (as opposed to a non-zero remote exit,
/// which is reported through [`Output`]).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("empty command provided")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The captured outcome of one remote command.
#[derive(Debug, Clone)]
pub struct Output {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// A successful outcome with no captured output (for tests).
    pub fn ok() -> Self {
        Self { success: true, exit_code: Some(0), stdout: String::new(), stderr: String::new() }
    }

    /// A failed outcome carrying `stderr` (for tests).
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self { success: false, exit_code: Some(2), stdout: String::new(), stderr: stderr.into() }
    }
}

impl From<process::Output> for Output {
    fn from(value: process::Output) -> Self {
        Self {
            success: value.status.success(),
            exit_code: value.status.code(),
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

/// Runs a single command on a single host.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn run(&self, host: Ipv4Addr, argv: &[String]) -> Result<Output, TransportError>;
}

/// SSH transport: `ssh -o StrictHostKeyChecking=no [-i key] user@host cmd…`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    user: String,
    key_path: Option<PathBuf>,
}

impl SshTransport {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), key_path: None }
    }

    /// Use an explicit identity file.
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// The full local argv for running `argv` on `host`. The remote command
    /// words are passed through as separate arguments; ssh joins them with
    /// spaces on the far side.
    fn ssh_argv(&self, host: Ipv4Addr, argv: &[String]) -> Vec<String> {
        let mut full = vec![
            "ssh".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
        ];
        if let Some(key) = &self.key_path {
            full.push("-i".to_string());
            full.push(key.display().to_string());
        }
        full.push(format!("{}@{}", self.user, host));
        full.extend(argv.iter().cloned());
        full
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run(&self, host: Ipv4Addr, argv: &[String]) -> Result<Output, TransportError> {
        if argv.is_empty() {
            return Err(TransportError::Empty);
        }

        let full = self.ssh_argv(host, argv);
        tracing::debug!(%host, cmd = full.join(" "), "running remote command");

        let output = tokio::process::Command::new(&full[0])
            .args(&full[1..])
            .stdout(process::Stdio::piped())
            .stderr(process::Stdio::piped())
            .output()
            .await?;

        let output = Output::from(output);
        if !output.success {
            tracing::debug!(%host, ?output.exit_code, stderr = %output.stderr.trim(), "remote command returned non-zero status");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_argv_includes_identity_and_target() {
        let transport = SshTransport::new("ec2-user").with_key("/home/op/.ssh/lkey");
        let argv = transport.ssh_argv(
            "172.16.1.10".parse().unwrap(),
            &["sudo".to_string(), "modprobe".to_string(), "ifb".to_string()],
        );
        assert_eq!(
            argv.join(" "),
            "ssh -o StrictHostKeyChecking=no -i /home/op/.ssh/lkey ec2-user@172.16.1.10 \
             sudo modprobe ifb"
        );
    }

    #[test]
    fn ssh_argv_without_key_omits_the_identity_flag() {
        let transport = SshTransport::new("admin");
        let argv = transport.ssh_argv("172.16.2.1".parse().unwrap(), &["true".to_string()]);
        assert_eq!(argv.join(" "), "ssh -o StrictHostKeyChecking=no admin@172.16.2.1 true");
    }
}
