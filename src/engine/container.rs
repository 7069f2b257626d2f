//! Container lifecycle invocations: start, stop, kill, remove, exec.

use super::EngineCommand;

/// `docker start`, optionally attached and interactive (the open flow).
#[derive(Debug, Clone)]
pub struct StartCommand {
    name: String,
    attach: bool,
    interactive: bool,
}

impl StartCommand {
    /// Start the named container in the background.
    #[must_use]
    pub fn new(name: impl Into<String>) -> StartCommand {
        StartCommand {
            name: name.into(),
            attach: false,
            interactive: false,
        }
    }

    /// Attach the terminal and keep stdin open.
    #[must_use]
    pub fn attached(mut self) -> StartCommand {
        self.attach = true;
        self.interactive = true;
        self
    }
}

impl EngineCommand for StartCommand {
    fn subcommand(&self) -> &'static str {
        "start"
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.attach {
            args.push("--attach".to_string());
        }
        if self.interactive {
            args.push("--interactive".to_string());
        }
        args.push(self.name.clone());
        args
    }
}

/// `docker stop` with the service's graceful timeout.
#[derive(Debug, Clone)]
pub struct StopCommand {
    name: String,
    timeout: u32,
}

impl StopCommand {
    /// Stop the named container, waiting `timeout` seconds before the
    /// engine escalates.
    #[must_use]
    pub fn new(name: impl Into<String>, timeout: u32) -> StopCommand {
        StopCommand {
            name: name.into(),
            timeout,
        }
    }
}

impl EngineCommand for StopCommand {
    fn subcommand(&self) -> &'static str {
        "stop"
    }

    fn build_args(&self) -> Vec<String> {
        vec![
            "--time".to_string(),
            self.timeout.to_string(),
            self.name.clone(),
        ]
    }
}

/// `docker kill` for forced shutdown.
#[derive(Debug, Clone)]
pub struct KillCommand {
    name: String,
}

impl KillCommand {
    /// Kill the named container immediately.
    #[must_use]
    pub fn new(name: impl Into<String>) -> KillCommand {
        KillCommand { name: name.into() }
    }
}

impl EngineCommand for KillCommand {
    fn subcommand(&self) -> &'static str {
        "kill"
    }

    fn build_args(&self) -> Vec<String> {
        vec![self.name.clone()]
    }
}

/// `docker rm`; anonymous volumes go with the container.
#[derive(Debug, Clone)]
pub struct RemoveCommand {
    name: String,
    wipe_anonymous: bool,
}

impl RemoveCommand {
    /// Remove the named container and its anonymous volumes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> RemoveCommand {
        RemoveCommand {
            name: name.into(),
            wipe_anonymous: true,
        }
    }
}

impl EngineCommand for RemoveCommand {
    fn subcommand(&self) -> &'static str {
        "rm"
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.wipe_anonymous {
            args.push("--volumes".to_string());
        }
        args.push(self.name.clone());
        args
    }
}

/// `docker exec` into a running container. The engine propagates the
/// command's exit status, which stands in for a separate exec-inspect
/// round trip.
#[derive(Debug, Clone)]
pub struct ExecCommand {
    name: String,
    command: Vec<String>,
}

impl ExecCommand {
    /// Run `command` inside the named container.
    #[must_use]
    pub fn new(name: impl Into<String>, command: Vec<String>) -> ExecCommand {
        ExecCommand {
            name: name.into(),
            command,
        }
    }
}

impl EngineCommand for ExecCommand {
    fn subcommand(&self) -> &'static str {
        "exec"
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![self.name.clone()];
        args.extend(self.command.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_carries_the_timeout() {
        let args = StopCommand::new("api", 10).command_args();
        assert_eq!(args, vec!["stop", "--time", "10", "api"]);
    }

    #[test]
    fn attached_start_is_interactive() {
        let args = StartCommand::new("api").attached().command_args();
        assert_eq!(args, vec!["start", "--attach", "--interactive", "api"]);
    }

    #[test]
    fn remove_wipes_anonymous_volumes() {
        let args = RemoveCommand::new("api").command_args();
        assert_eq!(args, vec!["rm", "--volumes", "api"]);
    }

    #[test]
    fn exec_appends_the_command() {
        let args = ExecCommand::new(
            "api",
            vec!["/bin/sh".to_string(), "-c".to_string(), "migrate".to_string()],
        )
        .command_args();
        assert_eq!(args, vec!["exec", "api", "/bin/sh", "-c", "migrate"]);
    }
}
