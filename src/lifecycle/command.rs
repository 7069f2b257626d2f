//! The open verb and custom command verbs.

use super::{print_progress, Dispatcher};
use crate::dump::Style;
use crate::engine::{
    CreateCommand, EngineCommand, ExecCommand, InspectContainer, RemoveCommand, StartCommand,
    StopCommand,
};
use crate::errors::Result;
use crate::project::{Environment, Service};
use crate::substitute::{self, VarMap};
use crate::value::Value;
use tracing::{debug, warn};

/// Split a command string into an argv, shell-style.
fn argv(command: &str) -> Vec<String> {
    shlex::split(command)
        .unwrap_or_else(|| command.split_whitespace().map(str::to_string).collect())
}

/// Apply an `open`-style directive to a service clone: a list is
/// `[entrypoint, args...]`, a scalar splits on the first space.
fn apply_command(service: &mut Service, entry: &str, rest: &[String]) {
    service
        .container
        .insert("entrypoint".to_string(), Value::str(entry));
    service.container.insert(
        "command".to_string(),
        Value::List(rest.iter().map(|s| Value::str(s.clone())).collect()),
    );
}

impl Dispatcher<'_> {
    /// Open an interactive session inside a fresh container for exactly
    /// one service. Returns the exit code of the attached session.
    pub(crate) async fn open(&self, services: &[Service]) -> Result<i32> {
        let startable: Vec<&Service> = services.iter().filter(|s| s.startable).collect();
        if startable.len() != 1 {
            println!("Cannot open more than 1 service in 1 call");
            return Ok(1);
        }
        let mut service = startable[0].clone();

        match service.open_spec.clone() {
            Some(Value::List(items)) if !items.is_empty() => {
                let parts: Vec<String> = items.iter().map(Value::render).collect();
                apply_command(&mut service, &parts[0], &parts[1..]);
            }
            Some(Value::List(_)) | None => {
                println!("'open' not defined for service. Using /bin/sh as entrypoint");
                apply_command(&mut service, "/bin/sh", &[]);
            }
            Some(scalar) => {
                let rendered = scalar.render();
                let (entry, rest) = rendered
                    .split_once(' ')
                    .map_or((rendered.as_str(), ""), |(e, r)| (e, r));
                apply_command(&mut service, entry, &argv(rest));
            }
        }
        service
            .container
            .insert("stdin_open".to_string(), Value::Bool(true));
        service.container.insert("tty".to_string(), Value::Bool(true));

        if self.invocation.dump {
            println!("{}", service.dump_run(Environment::Dev, Style::Pretty));
            return Ok(0);
        }
        let engine = self.engine()?;
        let spec =
            service.prepare_container_options(Environment::Dev, self.invocation.no_volumes)?;

        if InspectContainer::new(&spec.name).query(engine).await?.is_some() {
            let cleared = async {
                StopCommand::new(&spec.name, service.expected_timeout)
                    .execute(engine)
                    .await?;
                RemoveCommand::new(&spec.name).execute(engine).await
            };
            if let Err(e) = cleared.await {
                println!("could not stop {}: {e}", spec.name);
                return Ok(1);
            }
        }

        CreateCommand::new(spec.clone()).execute(engine).await?;
        engine
            .interactive(&StartCommand::new(&spec.name).attached())
            .await
    }

    /// Run a named command against every service whose command table
    /// carries the verb (or a `*` catch-all).
    ///
    /// A running container gets the command exec'd in place unless
    /// `--replace` asks for a takedown. Otherwise the command runs in a
    /// disposable container whose entrypoint is a long-lived no-op, and
    /// a displaced running container is recreated with its normal
    /// configuration afterwards.
    pub(crate) async fn custom(&self, word: &str, services: &[Service]) -> Result<bool> {
        let candidates: Vec<&Service> = services
            .iter()
            .filter(|s| s.commands.contains_key(word) || s.commands.contains_key("*"))
            .collect();
        if candidates.is_empty() {
            warn!(command = word, "no selected service defines this command");
            return Ok(true);
        }

        let command_vars: VarMap = [("COMMAND".to_string(), word.to_string())]
            .into_iter()
            .collect();
        // --force doubles as --replace for ad-hoc commands.
        let replace = self.invocation.replace || self.invocation.force;
        let mut ok = true;
        for service in candidates {
            let template = service
                .commands
                .get(word)
                .or_else(|| service.commands.get("*"))
                .cloned()
                .unwrap_or_default();
            let command = substitute::interpolate(&template, &command_vars)
                .unwrap_or(template);
            let (entry, rest) = command
                .split_once(' ')
                .map_or((command.as_str(), ""), |(e, r)| (e, r));
            let exec_argv = {
                let mut parts = vec![entry.to_string()];
                parts.extend(argv(rest));
                parts
            };

            let mut local = service.clone();
            apply_command(&mut local, entry, &argv(rest));
            if self.invocation.dump {
                println!("{}", local.dump_run(Environment::Dev, Style::Pretty));
                continue;
            }

            let engine = self.engine()?;
            let name = service.container_name();
            let existing = InspectContainer::new(&name).query(engine).await?;
            let running = existing.as_ref().is_some_and(|d| d.running());

            if running && !replace {
                debug!(service = %service.name, "running command in the existing container");
                let exec = ExecCommand::new(&name, exec_argv);
                if let Err(e) = engine.mutate_streaming(&exec, print_progress).await {
                    eprintln!("{e}");
                    ok = false;
                }
                continue;
            }

            // Ephemeral flow: displace whatever holds the name, run the
            // command inside a disposable container, then put the world
            // back the way it was.
            let displaced_running = running && replace;
            if existing.is_some() {
                let cleared = async {
                    StopCommand::new(&name, service.expected_timeout)
                        .execute(engine)
                        .await?;
                    RemoveCommand::new(&name).execute(engine).await
                };
                if let Err(e) = cleared.await {
                    eprintln!("{e}");
                    ok = false;
                    continue;
                }
            }

            let mut dummy = service.clone();
            apply_command(&mut dummy, "/bin/cat", &[]);
            dummy
                .container
                .insert("stdin_open".to_string(), Value::Bool(true));
            let dummy_spec =
                dummy.prepare_container_options(Environment::Dev, self.invocation.no_volumes)?;

            let ran = async {
                CreateCommand::new(dummy_spec.clone()).execute(engine).await?;
                StartCommand::new(&name).execute(engine).await?;
                engine
                    .mutate_streaming(&ExecCommand::new(&name, exec_argv), print_progress)
                    .await
            };
            let run_result = ran.await;

            let torn_down = async {
                StopCommand::new(&name, service.expected_timeout)
                    .execute(engine)
                    .await?;
                RemoveCommand::new(&name).execute(engine).await
            };
            if let Err(e) = torn_down.await {
                eprintln!("{e}");
                ok = false;
            }

            if displaced_running {
                let spec = service
                    .prepare_container_options(Environment::Dev, self.invocation.no_volumes)?;
                let restored = async {
                    CreateCommand::new(spec).execute(engine).await?;
                    StartCommand::new(&name).execute(engine).await
                };
                if let Err(e) = restored.await {
                    eprintln!("{e}");
                    ok = false;
                }
            }

            if let Err(e) = run_result {
                eprintln!("{e}");
                ok = false;
            }
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_splits_shell_style() {
        assert_eq!(
            argv("/bin/sh -c 'migrate --all'"),
            vec!["/bin/sh", "-c", "migrate --all"]
        );
        assert_eq!(argv(""), Vec::<String>::new());
    }
}
