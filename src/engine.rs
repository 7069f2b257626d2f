//! Typed adapter over the container engine CLI.
//!
//! Every engine operation the orchestrator performs is a small builder
//! struct that knows its subcommand and how to assemble its arguments,
//! all funnelled through one executor. Keeping argument construction
//! separate from execution makes the adapter testable without a daemon
//! and gives dump mode an honest account of what would have run.
//!
//! Failures are classified in [`classify`] from the engine's stderr
//! text; the rest of the crate only ever sees typed errors.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tracing::debug;

pub mod build;
pub mod classify;
pub mod container;
pub mod create;
pub mod inspect;
pub mod pull;
pub mod volume;

pub use build::BuildCommand;
pub use container::{ExecCommand, KillCommand, RemoveCommand, StartCommand, StopCommand};
pub use create::{CreateCommand, CreateSpec};
pub use inspect::{ContainerDetails, ImageDetails, InspectContainer, InspectImage, Mount};
pub use pull::PullCommand;
pub use volume::RemoveVolumeCommand;

/// Anything the engine can be asked to do.
#[async_trait]
pub trait EngineCommand: Send + Sync {
    /// The engine subcommand (`create`, `start`, …).
    fn subcommand(&self) -> &'static str;

    /// Arguments after the subcommand.
    fn build_args(&self) -> Vec<String>;

    /// The full argument vector, subcommand first.
    fn command_args(&self) -> Vec<String> {
        let mut args = vec![self.subcommand().to_string()];
        args.extend(self.build_args());
        args
    }

    /// Run the command through the engine, classifying failures.
    async fn execute(&self, engine: &Engine) -> Result<CommandOutput>
    where
        Self: Sized,
    {
        engine.mutate(self).await
    }
}

/// Captured output of a finished engine invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Collected stdout.
    pub stdout: String,
    /// Collected stderr.
    pub stderr: String,
    /// Exit status.
    pub status: i32,
}

impl CommandOutput {
    /// Whether the invocation exited zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// One line of live output from a streaming invocation.
#[derive(Debug, Clone)]
pub enum ProgressLine {
    /// A line the engine wrote to stdout.
    Stdout(String),
    /// A line the engine wrote to stderr.
    Stderr(String),
}

impl ProgressLine {
    /// The line text, whichever stream it came from.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            ProgressLine::Stdout(s) | ProgressLine::Stderr(s) => s,
        }
    }
}

/// Handle to the container engine binary.
#[derive(Debug, Clone)]
pub struct Engine {
    binary: PathBuf,
    dry_run: bool,
}

impl Engine {
    /// Locate the engine binary and confirm the daemon answers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EngineUnreachable`] when the binary is missing
    /// or the daemon does not respond to a version probe.
    pub async fn connect(dry_run: bool) -> Result<Engine> {
        let binary = which::which("docker").map_err(|e| Error::EngineUnreachable {
            message: format!("docker binary not found: {e}"),
        })?;
        let engine = Engine { binary, dry_run };
        let output = engine
            .capture(vec!["version".into(), "--format".into(), "{{.Server.Version}}".into()])
            .await?;
        if !output.success() {
            return Err(Error::EngineUnreachable {
                message: output.stderr.trim().to_string(),
            });
        }
        debug!(version = %output.stdout.trim(), "engine reachable");
        Ok(engine)
    }

    /// Whether mutations are suppressed.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run a read-only invocation and capture its output. Dry-run mode
    /// does not apply; reads are always allowed.
    pub async fn capture(&self, args: Vec<String>) -> Result<CommandOutput> {
        debug!(?args, "engine invocation");
        let output = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::io(format!("running docker {}", args.join(" ")), e))?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status.code().unwrap_or(-1),
        })
    }

    /// Run a mutating command; classify failures. Dry-run mode logs the
    /// invocation instead and reports success.
    pub async fn mutate(&self, command: &dyn EngineCommand) -> Result<CommandOutput> {
        let args = command.command_args();
        if self.dry_run {
            println!("[dry-run] docker {}", args.join(" "));
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                status: 0,
            });
        }
        let output = self.capture(args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(classify::classify(
                command.subcommand(),
                output.status,
                &output.stderr,
            ))
        }
    }

    /// Run a mutating command forwarding its output line by line as it
    /// is produced. Used for builds and pulls, whose progress the user
    /// should see live.
    pub async fn mutate_streaming<F>(
        &self,
        command: &dyn EngineCommand,
        mut on_line: F,
    ) -> Result<CommandOutput>
    where
        F: FnMut(&ProgressLine),
    {
        let args = command.command_args();
        if self.dry_run {
            println!("[dry-run] docker {}", args.join(" "));
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                status: 0,
            });
        }
        debug!(?args, "streaming engine invocation");
        let mut child = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(format!("running docker {}", args.join(" ")), e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(ProgressLine::Stdout(line)).is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(ProgressLine::Stderr(line)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut stderr_tail = Vec::new();
        while let Some(line) = rx.recv().await {
            if let ProgressLine::Stderr(text) = &line {
                stderr_tail.push(text.clone());
                if stderr_tail.len() > 50 {
                    stderr_tail.remove(0);
                }
            }
            on_line(&line);
        }
        let status = child
            .wait()
            .await
            .map_err(|e| Error::io("waiting for engine".to_string(), e))?;
        let output = CommandOutput {
            stdout: String::new(),
            stderr: stderr_tail.join("\n"),
            status: status.code().unwrap_or(-1),
        };
        if output.success() {
            Ok(output)
        } else {
            Err(classify::classify(
                command.subcommand(),
                output.status,
                &output.stderr,
            ))
        }
    }

    /// Hand the terminal over to the engine for an interactive session
    /// (`docker start -a -i`). Stdio is inherited; the engine's exit
    /// status becomes ours.
    pub async fn interactive(&self, command: &dyn EngineCommand) -> Result<i32> {
        let args = command.command_args();
        if self.dry_run {
            println!("[dry-run] docker {}", args.join(" "));
            return Ok(0);
        }
        let status = TokioCommand::new(&self.binary)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| Error::io(format!("running docker {}", args.join(" ")), e))?;
        Ok(status.code().unwrap_or(-1))
    }
}
