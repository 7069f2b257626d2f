//! The start and stop verbs.

use super::{print_progress, Dispatcher};
use crate::dump::{CommandLine, Style};
use crate::engine::{
    ContainerDetails, CreateCommand, EngineCommand, InspectContainer, InspectImage, KillCommand,
    PullCommand, RemoveCommand, RemoveVolumeCommand, StartCommand, StopCommand,
};
use crate::errors::{Error, Result};
use crate::project::{Environment, Service};
use tracing::{debug, warn};

impl Dispatcher<'_> {
    /// Create and start every startable service in the selection.
    pub(crate) async fn start(&self, services: &[Service]) -> Result<bool> {
        let mut ok = true;
        for service in services.iter().filter(|s| s.startable) {
            if self.invocation.dump {
                println!("{}", service.dump_run(Environment::Dev, Style::Pretty));
                continue;
            }
            let engine = self.engine()?;
            let spec =
                service.prepare_container_options(Environment::Dev, self.invocation.no_volumes)?;

            let existing = InspectContainer::new(&spec.name).query(engine).await?;
            if existing.is_some() {
                // The container is left in place; restart forces
                // recreation. The run still counts it as a failure.
                let err = Error::ContainerAlreadyExists {
                    detail: format!("{}; use restart to recreate it", spec.name),
                };
                eprintln!("{err}");
                ok = false;
                continue;
            }

            // A start-only service with no local image has nothing to
            // build from; pull it. The engine resolves the registry
            // from the image name itself.
            let image_present = InspectImage::new(&service.image).query(engine).await?.is_some();
            if !image_present
                && !service.buildable()
                && self.invocation.pull() != Some(false)
            {
                let reference = service.image_ref();
                let pull = PullCommand::new(reference.pull_name(), reference.tag.clone());
                if let Err(e) = engine.mutate_streaming(&pull, print_progress).await {
                    eprintln!("{e}");
                    ok = false;
                    continue;
                }
            }

            println!("Starting {}", spec.name);
            let created = async {
                CreateCommand::new(spec.clone()).execute(engine).await?;
                StartCommand::new(&spec.name).execute(engine).await
            };
            if let Err(e) = created.await {
                eprintln!("{e}");
                ok = false;
            }
        }
        Ok(ok)
    }

    /// Stop and remove every startable service in the selection,
    /// wiping volumes when asked to.
    pub(crate) async fn stop(&self, services: &[Service]) -> Result<bool> {
        let mut ok = true;
        for service in services.iter().filter(|s| s.startable) {
            let name = service.container_name();
            if self.invocation.dump {
                let line = if self.invocation.force {
                    CommandLine::new("kill").positional(&name)
                } else {
                    CommandLine::new("stop")
                        .option("--time", service.expected_timeout.to_string())
                        .positional(&name)
                };
                println!("{}", line.render(Style::Pretty));
                println!(
                    "{}",
                    CommandLine::new("rm")
                        .flag("--volumes", true)
                        .positional(&name)
                        .render(Style::Pretty)
                );
                continue;
            }
            let engine = self.engine()?;
            let Some(details) = InspectContainer::new(&name).query(engine).await? else {
                println!("{name} does not exist.");
                continue;
            };

            let stopped = async {
                if self.invocation.force {
                    println!("Killing {name}");
                    KillCommand::new(&name).execute(engine).await?;
                } else {
                    println!("Stopping {name}");
                    StopCommand::new(&name, service.expected_timeout)
                        .execute(engine)
                        .await?;
                }
                println!("Removing {name}");
                RemoveCommand::new(&name).execute(engine).await
            };
            if let Err(e) = stopped.await {
                eprintln!("{e}");
                ok = false;
                continue;
            }
            if self.invocation.wipe {
                self.remove_volumes(&details).await?;
            }
        }
        Ok(ok)
    }

    /// Remove the volumes a container was using. Engine-managed volumes
    /// go through the engine; host directory binds are deleted
    /// best-effort, with permission problems downgraded to warnings.
    pub(crate) async fn remove_volumes(&self, details: &ContainerDetails) -> Result<()> {
        let engine = self.engine()?;
        for mount in &details.mounts {
            if mount.source.starts_with("/var/lib/docker/volumes") {
                let Some(volume) = &mount.name else {
                    continue;
                };
                debug!(volume = %volume, "having the engine remove the volume");
                if let Err(e) = RemoveVolumeCommand::new(volume).execute(engine).await {
                    warn!(volume = %volume, error = %e, "cannot remove volume");
                }
            } else if std::path::Path::new(&mount.source).is_dir() {
                debug!(dir = %mount.source, "removing host directory bind");
                if let Err(e) = std::fs::remove_dir_all(&mount.source) {
                    println!("Cannot remove directory {}: {e}", mount.source);
                }
            } else {
                debug!(source = %mount.source, "the engine already removed this volume");
            }
        }
        Ok(())
    }
}
