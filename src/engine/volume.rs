//! Volume removal, used by the wipe flow.

use super::EngineCommand;

/// `docker volume rm`.
#[derive(Debug, Clone)]
pub struct RemoveVolumeCommand {
    name: String,
}

impl RemoveVolumeCommand {
    /// Remove the named volume.
    #[must_use]
    pub fn new(name: impl Into<String>) -> RemoveVolumeCommand {
        RemoveVolumeCommand { name: name.into() }
    }
}

impl EngineCommand for RemoveVolumeCommand {
    fn subcommand(&self) -> &'static str {
        "volume"
    }

    fn build_args(&self) -> Vec<String> {
        vec!["rm".to_string(), self.name.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_by_name() {
        let args = RemoveVolumeCommand::new("appdata").command_args();
        assert_eq!(args, vec!["volume", "rm", "appdata"]);
    }
}
