use async_trait::async_trait;
use tokio::process::Command;

/// Kicks off certificate issuance for a newly accepted host.
///
/// Issuance itself runs elsewhere. It reports back through the client API's challenge and
/// certificate endpoints.
#[async_trait]
pub trait Issuer: Send + Sync {
    async fn issue(&self, hostname: &str);
}

/// Runs the configured command with the hostname appended, without waiting for it.
#[derive(Debug, Clone)]
pub struct CommandIssuer {
    argv: Vec<String>,
}

impl CommandIssuer {
    /// `None` when `argv` is empty.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }
}

#[async_trait]
impl Issuer for CommandIssuer {
    async fn issue(&self, hostname: &str) {
        let (program, args) = self.argv.split_at(1);
        let mut command = Command::new(&program[0]);
        command.args(args).arg(hostname);
        match command.spawn() {
            Err(err) => tracing::warn!("failed to start issuance for {hostname}: {err}"),
            Ok(mut child) => {
                tracing::info!("started issuance for {hostname}");
                let hostname = hostname.to_string();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => {}
                        Ok(status) => tracing::warn!("issuance for {hostname} exited with {status}"),
                        Err(err) => tracing::warn!("issuance for {hostname} failed: {err}"),
                    }
                });
            }
        }
    }
}

/// Used when no issuance command is configured.
#[derive(Debug, Clone, Default)]
pub struct LogIssuer;

#[async_trait]
impl Issuer for LogIssuer {
    async fn issue(&self, hostname: &str) {
        tracing::info!("{hostname} is ready for issuance; no issue_command configured");
    }
}
