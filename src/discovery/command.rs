// Bounded, retrying execution of OS query commands

use crate::error::DiscoveryError;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::sleep;

/// Retry policy for transient command failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Run each operation exactly once
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Exponential backoff delay before retrying after `attempt` (1-based)
    pub fn delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    /// Execute an operation, retrying transient discovery failures
    pub async fn run<F, T, Fut>(&self, operation_name: &str, operation: F) -> Result<T, DiscoveryError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, DiscoveryError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!("Operation '{}' succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    tracing::warn!("Operation '{}' failed on attempt {}: {}", operation_name, attempt, error);

                    if error.is_permanent() || attempt >= attempts {
                        return Err(error);
                    }

                    let delay = self.delay(attempt);
                    tracing::debug!("Retrying in {:?}...", delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Runs external programs with a timeout and captures their stdout
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program args...` and return its stdout, retrying per policy
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String, DiscoveryError> {
        self.retry
            .run(program, move || self.run_once(program, args))
            .await
    }

    async fn run_once(&self, program: &str, args: &[&str]) -> Result<String, DiscoveryError> {
        tracing::debug!("Running {} {}", program, args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, e))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DiscoveryError::TimedOut {
                program: program.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|e| spawn_error(program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let status = match output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "a signal".to_string(),
            };
            return Err(DiscoveryError::Failed {
                program: program.to_string(),
                status,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn spawn_error(program: &str, error: std::io::Error) -> DiscoveryError {
    match error.kind() {
        ErrorKind::NotFound => DiscoveryError::MissingTool {
            program: program.to_string(),
        },
        ErrorKind::PermissionDenied => DiscoveryError::PermissionDenied {
            program: program.to_string(),
        },
        _ => DiscoveryError::Spawn {
            program: program.to_string(),
            message: error.to_string(),
        },
    }
}
