//! The build and build-prod verbs.

use super::{print_progress, run_event, Dispatcher};
use crate::dump::Style;
use crate::engine::BuildCommand;
use crate::engine::PullCommand;
use crate::errors::{Error, Result};
use crate::project::{BuildDump, Environment, Service};
use crate::reference::ImageRef;
use crate::registry::{self, RegistryOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The FROM line discovered in a source descriptor, plus the file the
/// build should actually use (a rewritten copy when a `fromline`
/// override applies).
struct SourceDescriptor {
    upstream: Option<ImageRef>,
    dockerfile: PathBuf,
    _rewritten: Option<tempfile::NamedTempFile>,
}

/// Read a source descriptor and extract its first FROM line, replacing
/// it with `override_line` when one is configured.
fn open_source_descriptor(path: &Path, override_line: &str) -> Result<SourceDescriptor> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading {}", path.display()), e))?;

    let mut upstream = None;
    let mut rewritten_lines = Vec::new();
    for line in content.lines() {
        if line.starts_with("FROM") && upstream.is_none() {
            let effective = if override_line.is_empty() {
                line
            } else {
                override_line
            };
            upstream = effective
                .split_whitespace()
                .nth(1)
                .map(ImageRef::parse);
            rewritten_lines.push(effective.to_string());
        } else {
            rewritten_lines.push(line.to_string());
        }
    }

    if override_line.is_empty() {
        return Ok(SourceDescriptor {
            upstream,
            dockerfile: path.to_path_buf(),
            _rewritten: None,
        });
    }
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| Error::io("creating a rewritten source descriptor", e))?;
    tmp.write_all(rewritten_lines.join("\n").as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| Error::io("writing a rewritten source descriptor", e))?;
    Ok(SourceDescriptor {
        upstream,
        dockerfile: tmp.path().to_path_buf(),
        _rewritten: Some(tmp),
    })
}

impl Dispatcher<'_> {
    /// Build every buildable service in the selection. Returns whether
    /// the whole pass succeeded; a failing build aborts the remainder.
    pub(crate) async fn build(&self, services: &[Service], env: Environment) -> Result<bool> {
        let buildable: Vec<&Service> = services.iter().filter(|s| s.buildable()).collect();
        if buildable.is_empty() {
            debug!("nothing to build in the selection");
            return Ok(true);
        }
        println!(
            "building services: {}",
            buildable
                .iter()
                .map(|s| s.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let cache = self
            .invocation
            .cache()
            .unwrap_or(env == Environment::Dev);
        let mut ok = true;
        let mut built = Vec::new();
        for service in &buildable {
            println!("building {}", service.name);
            if self.invocation.dump {
                let opts = BuildDump {
                    pull: false,
                    rm: !self.invocation.no_rm,
                    force_rm: self.invocation.force,
                    cache,
                };
                println!("{}", service.dump_build(env, &opts, Style::Pretty));
                continue;
            }

            if !run_event("prebuild", env, service)? {
                ok = false;
                continue;
            }

            let dockerfile = service.dockerfile.get(env);
            if dockerfile.is_empty() || !Path::new(dockerfile).is_file() {
                warn!(
                    service = %service.name,
                    "source descriptor does not exist; not continuing with this service"
                );
                continue;
            }
            let source = open_source_descriptor(
                Path::new(dockerfile),
                service.fromline.get(env),
            )?;
            let Some(upstream) = source.upstream else {
                warn!(
                    service = %service.name,
                    "source descriptor has no FROM line; not continuing with this service"
                );
                continue;
            };

            if self.pulling(&upstream) && !self.invocation.dry_run {
                let options = RegistryOptions {
                    no_verify: self.invocation.no_verify,
                    pull_intended: true,
                    ..RegistryOptions::default()
                };
                if registry::image_is_newer(self.engine()?, &upstream, &options).await? {
                    debug!(image = %upstream, "pulling upstream");
                    let pull = PullCommand::new(upstream.pull_name(), upstream.tag.clone());
                    self.engine()?
                        .mutate_streaming(&pull, print_progress)
                        .await?;
                }
            }

            if !self.invocation.dry_run {
                let context = Path::new(dockerfile)
                    .parent()
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                let command = BuildCommand::new(context, service.image.clone(), &source.dockerfile)
                    .no_cache(!cache)
                    .rm(!self.invocation.no_rm)
                    .force_rm(self.invocation.force)
                    .pull(false);
                if let Err(e) = self
                    .engine()?
                    .mutate_streaming(&command, print_progress)
                    .await
                {
                    // A failed build aborts the remaining services.
                    eprintln!("{e}");
                    return Ok(false);
                }
            }
            built.push(service.image.clone());

            if !run_event("postbuild", env, service)? {
                println!(
                    "{}: Your environment may not have been cleaned up",
                    service.name
                );
                if env == Environment::Prod {
                    return Ok(false);
                }
            }
        }

        if env == Environment::Prod && !self.invocation.dry_run && !self.invocation.dump {
            println!("writing IMAGES.txt");
            let mut f = std::fs::File::create("IMAGES.txt")
                .map_err(|e| Error::io("writing IMAGES.txt", e))?;
            for image in &built {
                writeln!(f, "{image}").map_err(|e| Error::io("writing IMAGES.txt", e))?;
            }
        }
        Ok(ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_line_is_discovered() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = dir.path().join("Dockerfile");
        std::fs::write(&dockerfile, "FROM registry.example.com/base:1.2\nRUN true\n").unwrap();
        let source = open_source_descriptor(&dockerfile, "").unwrap();
        let upstream = source.upstream.unwrap();
        assert_eq!(upstream.domain.as_deref(), Some("registry.example.com"));
        assert_eq!(upstream.image, "base");
        assert_eq!(upstream.tag, "1.2");
        assert_eq!(source.dockerfile, dockerfile);
    }

    #[test]
    fn fromline_override_rewrites_the_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = dir.path().join("Dockerfile");
        std::fs::write(&dockerfile, "FROM base:old\nRUN true\n").unwrap();
        let source = open_source_descriptor(&dockerfile, "FROM base:new").unwrap();
        assert_eq!(source.upstream.as_ref().unwrap().tag, "new");
        assert_ne!(source.dockerfile, dockerfile);
        let rewritten = std::fs::read_to_string(&source.dockerfile).unwrap();
        assert!(rewritten.starts_with("FROM base:new"));
        assert!(rewritten.contains("RUN true"));
    }

    #[test]
    fn descriptor_without_from_yields_no_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let dockerfile = dir.path().join("Dockerfile");
        std::fs::write(&dockerfile, "RUN true\n").unwrap();
        let source = open_source_descriptor(&dockerfile, "").unwrap();
        assert!(source.upstream.is_none());
    }
}
