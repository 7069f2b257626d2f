//! Verb dispatch and the container lifecycle.
//!
//! The dispatcher owns the mapping from an invocation's verb to
//! per-service actions. Services are processed strictly sequentially,
//! sorted by `(service, container name)` so output is deterministic. A
//! failing service marks the run failed but does not stop the
//! remaining iteration; only pre-checks abort outright.
//!
//! The registry stays read-only: whenever a verb needs to vary a
//! service's configuration (open, custom commands, CLI overrides), it
//! works on a local clone.

use crate::cli::Invocation;
use crate::engine::{Engine, ProgressLine};
use crate::errors::{Error, Result};
use crate::project::{Environment, Project, Service};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

pub mod build;
pub mod command;
pub mod runtime;

/// The verb the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// Build dev images, then restart.
    Default,
    /// Build dev images.
    Build,
    /// Build prod images and record them in `IMAGES.txt`.
    BuildProd,
    /// Create and start containers.
    Start,
    /// Stop and remove containers.
    Stop,
    /// Stop, then start.
    Restart,
    /// Replace the entrypoint with the service's `open` directive and
    /// attach interactively.
    Open,
    /// A verb looked up in each service's command table.
    Custom(String),
}

impl Verb {
    /// Map a verb word onto a handler. Unknown words become custom
    /// commands.
    #[must_use]
    pub fn parse(word: &str) -> Verb {
        match word {
            "default" => Verb::Default,
            "build" => Verb::Build,
            "build-prod" => Verb::BuildProd,
            "start" => Verb::Start,
            "stop" => Verb::Stop,
            "restart" | "rere" => Verb::Restart,
            "open" => Verb::Open,
            other => Verb::Custom(other.to_string()),
        }
    }
}

/// Everything a verb handler needs.
pub struct Dispatcher<'a> {
    /// The engine, absent in dump mode.
    pub engine: Option<&'a Engine>,
    /// The frozen service registry.
    pub project: &'a Project,
    /// The parsed command line.
    pub invocation: &'a Invocation,
}

impl<'a> Dispatcher<'a> {
    /// Wire up a dispatcher.
    #[must_use]
    pub fn new(
        engine: Option<&'a Engine>,
        project: &'a Project,
        invocation: &'a Invocation,
    ) -> Dispatcher<'a> {
        Dispatcher {
            engine,
            project,
            invocation,
        }
    }

    /// Run the invocation's verb over its selected services and return
    /// the process exit code.
    ///
    /// # Errors
    ///
    /// Pre-check failures (unknown service names, registry problems
    /// with a mandatory pull) propagate; per-service operational
    /// failures are folded into the exit code instead.
    pub async fn dispatch(&self) -> Result<i32> {
        let services = self.selection()?;
        let verb = Verb::parse(&self.invocation.verb);
        let ok = match &verb {
            Verb::Build => self.build(&services, Environment::Dev).await?,
            Verb::BuildProd => self.build(&services, Environment::Prod).await?,
            Verb::Start => self.start(&services).await?,
            Verb::Stop => self.stop(&services).await?,
            Verb::Restart => self.stop(&services).await? && self.start(&services).await?,
            Verb::Default => {
                if self.build(&services, Environment::Dev).await? {
                    self.stop(&services).await? && self.start(&services).await?
                } else {
                    false
                }
            }
            Verb::Open => return self.open(&services).await,
            Verb::Custom(word) => self.custom(word, &services).await?,
        };
        Ok(i32::from(!ok))
    }

    /// Resolve the selected service set: the named services, or the
    /// `required` group when none were named. Single-service CLI
    /// overrides (`--image`, `--name`, `--dockerfile`) are applied to
    /// local clones here.
    fn selection(&self) -> Result<Vec<Service>> {
        let selected = self.project.select(&self.invocation.services)?;
        let mut services: Vec<Service> = selected.into_iter().cloned().collect();
        services.sort_by_key(Service::sort_key);

        if services.len() == 1 {
            let service = &mut services[0];
            if let Some(image) = &self.invocation.image {
                service.image = image.clone();
            }
            if let Some(name) = &self.invocation.name {
                service
                    .container
                    .insert("name".to_string(), crate::value::Value::str(name.clone()));
            }
            if let Some(dockerfile) = &self.invocation.dockerfile {
                service.dockerfile.dev = dockerfile.clone();
                service.dockerfile.prod = dockerfile.clone();
            }
        } else if self.invocation.image.is_some()
            || self.invocation.name.is_some()
            || self.invocation.dockerfile.is_some()
        {
            warn!("--image, --name, and --dockerfile apply only when one service is selected");
        }
        Ok(services)
    }

    /// The engine, or an error for verbs that cannot run without one.
    pub(crate) fn engine(&self) -> Result<&'a Engine> {
        self.engine.ok_or_else(|| Error::EngineUnreachable {
            message: "engine calls are disabled in dump mode".to_string(),
        })
    }

    /// Whether an upstream freshness probe and pull should happen for a
    /// build-family verb.
    ///
    /// `--no-pull` always wins and `--pull` always asks; with neither,
    /// build verbs pull when the upstream names a registry. A
    /// registryless upstream is never probed.
    #[must_use]
    pub(crate) fn pulling(&self, upstream: &crate::reference::ImageRef) -> bool {
        match self.invocation.pull() {
            Some(false) => false,
            Some(true) => {
                if upstream.registry().is_none() {
                    warn!(image = %upstream, "no registry to pull from; skipping pull");
                    false
                } else {
                    true
                }
            }
            None => upstream.registry().is_some(),
        }
    }
}

/// Forward one progress line to the user. Error-bearing lines get a
/// red tint; everything else passes through verbatim.
pub fn print_progress(line: &ProgressLine) {
    let text = line.text();
    if text.is_empty() {
        return;
    }
    let lowered = text.to_ascii_lowercase();
    if lowered.starts_with("error") || lowered.contains(" error") {
        println!("\x1b[31m{text}\x1b[0m");
    } else {
        println!("{text}");
    }
}

/// Run an event hook (`prebuild`, `postbuild`) for a service.
///
/// The hook may be a bare command string or an environment-keyed map;
/// a missing entry succeeds trivially. The hook runs from the service's
/// source-descriptor directory, with the previous working directory
/// restored on every exit path.
pub fn run_event(event: &str, env: Environment, service: &Service) -> Result<bool> {
    let Some(spec) = service.events.get(event) else {
        return Ok(true);
    };
    let command = match spec {
        crate::value::Value::Map(entries) => match entries.get(env.key()) {
            Some(command) => command.render(),
            None => return Ok(true),
        },
        scalar => scalar.render(),
    };
    if command.is_empty() {
        return Ok(true);
    }

    let dockerfile = service.dockerfile.get(env);
    let dir = if dockerfile.is_empty() {
        service
            .source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    } else {
        Path::new(dockerfile)
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf()
    };

    debug!(event, command = %command, dir = %dir.display(), "running event hook");
    let _guard = WorkingDirectory::enter(&dir)?;
    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(&command)
        .status()
        .map_err(|e| Error::io(format!("running {event} hook"), e))?;
    if status.success() {
        Ok(true)
    } else {
        error!(
            service = %service.name,
            event,
            "hook failed; will not continue with this service"
        );
        Ok(false)
    }
}

/// Scoped working-directory change. Restores the previous directory on
/// drop, so hooks cannot leak a chdir past their own invocation.
struct WorkingDirectory {
    previous: PathBuf,
}

impl WorkingDirectory {
    fn enter(dir: &Path) -> Result<WorkingDirectory> {
        let previous = std::env::current_dir()
            .map_err(|e| Error::io("reading the working directory", e))?;
        std::env::set_current_dir(dir)
            .map_err(|e| Error::io(format!("entering {}", dir.display()), e))?;
        Ok(WorkingDirectory { previous })
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            error!(error = %e, "could not restore the working directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_and_fall_back_to_custom() {
        assert_eq!(Verb::parse("build"), Verb::Build);
        assert_eq!(Verb::parse("build-prod"), Verb::BuildProd);
        assert_eq!(Verb::parse("rere"), Verb::Restart);
        assert_eq!(Verb::parse("migrate"), Verb::Custom("migrate".to_string()));
    }

    #[test]
    fn working_directory_guard_restores_on_drop() {
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        {
            let _guard = WorkingDirectory::enter(dir.path()).unwrap();
            assert_eq!(
                std::env::current_dir().unwrap().canonicalize().unwrap(),
                dir.path().canonicalize().unwrap()
            );
        }
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
