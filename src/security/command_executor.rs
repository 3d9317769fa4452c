//! SafeCommandExecutor: whitelisted execution of the GDAL command-line tools
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: only the GDAL vector tools can execute,
//!   either by bare name or by an absolute path ending in an allowed name
//! - **Injection prevention**: arguments are passed as a vector, never
//!   interpolated into a shell string
//! - **Working directory validation**: validated on construction
//! - **Timeout control**: the child is killed when the timeout elapses
//!
//! # Example
//!
//! ```rust,no_run
//! use shapefile_publisher::security::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(30));
//!
//! let output = executor.execute("ogr2ogr", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Tools that may be executed
const ALLOWED_COMMANDS: &[&str] = &["ogr2ogr", "ogrinfo"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command could not be started (binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl SafeCommandExecutor {
    /// Create a new executor rooted at `working_dir`, which must exist
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
        })
    }

    /// Set command execution timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Whether `command` names an allowed tool, by bare name or full path
    pub fn is_allowed(command: &str) -> bool {
        let name = Path::new(command)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        ALLOWED_COMMANDS.contains(&name)
    }

    /// Execute a whitelisted command and capture its output
    ///
    /// A non-zero exit status is not an error here; callers inspect
    /// `Output::status`.
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        if !Self::is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // Arguments may carry connection passwords; only the shape is logged.
        tracing::debug!(
            command,
            args = args.len(),
            cwd = %self.working_dir.display(),
            "executing command"
        );

        let child = Command::new(command)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout(limit))?,
            None => child.wait_with_output().await,
        };

        output.map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", command, e)))
    }
}
