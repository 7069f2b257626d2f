//! Image pulls.

use super::EngineCommand;

/// `docker pull`. The registry is part of the image name as far as the
/// engine is concerned, so callers hand in a pull name and a tag.
#[derive(Debug, Clone)]
pub struct PullCommand {
    pull_name: String,
    tag: String,
}

impl PullCommand {
    /// Pull `pull_name:tag`.
    #[must_use]
    pub fn new(pull_name: impl Into<String>, tag: impl Into<String>) -> PullCommand {
        PullCommand {
            pull_name: pull_name.into(),
            tag: tag.into(),
        }
    }
}

impl EngineCommand for PullCommand {
    fn subcommand(&self) -> &'static str {
        "pull"
    }

    fn build_args(&self) -> Vec<String> {
        vec![format!("{}:{}", self.pull_name, self.tag)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rides_in_the_image_name() {
        let args = PullCommand::new("registry.example.com:5000/team/app", "dev").command_args();
        assert_eq!(args, vec!["pull", "registry.example.com:5000/team/app:dev"]);
    }
}
