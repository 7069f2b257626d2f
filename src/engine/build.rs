//! Image builds.

use super::EngineCommand;
use std::path::PathBuf;

/// `docker build` with the options the dispatcher controls.
#[derive(Debug, Clone)]
pub struct BuildCommand {
    context: PathBuf,
    tag: String,
    dockerfile: PathBuf,
    no_cache: bool,
    rm: bool,
    force_rm: bool,
    pull: bool,
}

impl BuildCommand {
    /// Build `tag` from `dockerfile` with `context` as the build root.
    #[must_use]
    pub fn new(
        context: impl Into<PathBuf>,
        tag: impl Into<String>,
        dockerfile: impl Into<PathBuf>,
    ) -> BuildCommand {
        BuildCommand {
            context: context.into(),
            tag: tag.into(),
            dockerfile: dockerfile.into(),
            no_cache: false,
            rm: true,
            force_rm: false,
            pull: false,
        }
    }

    /// Disable the layer cache.
    #[must_use]
    pub fn no_cache(mut self, on: bool) -> BuildCommand {
        self.no_cache = on;
        self
    }

    /// Remove intermediate containers after a successful build.
    #[must_use]
    pub fn rm(mut self, on: bool) -> BuildCommand {
        self.rm = on;
        self
    }

    /// Always remove intermediate containers.
    #[must_use]
    pub fn force_rm(mut self, on: bool) -> BuildCommand {
        self.force_rm = on;
        self
    }

    /// Let the engine refresh the base image itself. The dispatcher
    /// normally pre-pulls through the registry probe and leaves this
    /// off.
    #[must_use]
    pub fn pull(mut self, on: bool) -> BuildCommand {
        self.pull = on;
        self
    }
}

impl EngineCommand for BuildCommand {
    fn subcommand(&self) -> &'static str {
        "build"
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "--tag".to_string(),
            self.tag.clone(),
            "--file".to_string(),
            self.dockerfile.display().to_string(),
        ];
        if self.no_cache {
            args.push("--no-cache".to_string());
        }
        if self.rm {
            args.push("--rm".to_string());
        }
        if self.force_rm {
            args.push("--force-rm".to_string());
        }
        if self.pull {
            args.push("--pull".to_string());
        }
        args.push(self.context.display().to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_the_final_argument() {
        let args = BuildCommand::new("/src/app", "app:dev", "/src/app/Dockerfile")
            .no_cache(true)
            .command_args();
        assert_eq!(
            args,
            vec![
                "build",
                "--tag",
                "app:dev",
                "--file",
                "/src/app/Dockerfile",
                "--no-cache",
                "--rm",
                "/src/app",
            ]
        );
    }
}
