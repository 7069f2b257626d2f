//! Read-only inspection of images and containers.
//!
//! Inspection runs even in dry-run mode; the dispatcher needs to see
//! real state to decide what it would have done.

use super::{CommandOutput, Engine, EngineCommand};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// What the engine reports about a local image.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDetails {
    /// Image id.
    #[serde(rename = "Id")]
    pub id: String,
    /// Creation timestamp, RFC 3339.
    #[serde(rename = "Created")]
    pub created: String,
}

impl ImageDetails {
    /// Parsed creation time, when the engine's timestamp is readable.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// One mount of an existing container.
#[derive(Debug, Clone, Deserialize)]
pub struct Mount {
    /// Volume name, for engine-managed volumes.
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    /// Host-side source path.
    #[serde(rename = "Source", default)]
    pub source: String,
    /// Container-side destination path.
    #[serde(rename = "Destination", default)]
    pub destination: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ContainerState {
    #[serde(rename = "Running", default)]
    running: bool,
}

/// What the engine reports about an existing container.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerDetails {
    /// Container id.
    #[serde(rename = "Id")]
    pub id: String,
    /// Container name, `/`-prefixed by the engine.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Image the container was created from.
    #[serde(rename = "Image", default)]
    pub image: String,
    /// Mounts, for the wipe flow.
    #[serde(rename = "Mounts", default)]
    pub mounts: Vec<Mount>,
    #[serde(rename = "State")]
    state: ContainerState,
}

impl ContainerDetails {
    /// Whether the container is currently running.
    #[must_use]
    pub fn running(&self) -> bool {
        self.state.running
    }
}

/// `docker image inspect`.
#[derive(Debug, Clone)]
pub struct InspectImage {
    reference: String,
}

impl InspectImage {
    /// Inspect the image with this reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> InspectImage {
        InspectImage {
            reference: reference.into(),
        }
    }

    /// Run the inspection. Absence is `Ok(None)`, not an error.
    pub async fn query(&self, engine: &Engine) -> Result<Option<ImageDetails>> {
        parse_inspect(engine.capture(self.command_args()).await?)
    }
}

impl EngineCommand for InspectImage {
    fn subcommand(&self) -> &'static str {
        "image"
    }

    fn build_args(&self) -> Vec<String> {
        vec!["inspect".to_string(), self.reference.clone()]
    }
}

/// `docker container inspect`.
#[derive(Debug, Clone)]
pub struct InspectContainer {
    name: String,
}

impl InspectContainer {
    /// Inspect the container with this name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> InspectContainer {
        InspectContainer { name: name.into() }
    }

    /// Run the inspection. Absence is `Ok(None)`, not an error.
    pub async fn query(&self, engine: &Engine) -> Result<Option<ContainerDetails>> {
        parse_inspect(engine.capture(self.command_args()).await?)
    }
}

impl EngineCommand for InspectContainer {
    fn subcommand(&self) -> &'static str {
        "container"
    }

    fn build_args(&self) -> Vec<String> {
        vec!["inspect".to_string(), self.name.clone()]
    }
}

fn parse_inspect<T: serde::de::DeserializeOwned>(output: CommandOutput) -> Result<Option<T>> {
    if !output.success() {
        if output.stderr.contains("No such") {
            return Ok(None);
        }
        return Err(super::classify::classify(
            "inspect",
            output.status,
            &output.stderr,
        ));
    }
    let mut parsed: Vec<T> =
        serde_json::from_str(&output.stdout).map_err(|e| Error::EngineCommand {
            command: "inspect".to_string(),
            status: 0,
            stderr: format!("unreadable inspect output: {e}"),
        })?;
    Ok(if parsed.is_empty() {
        None
    } else {
        Some(parsed.remove(0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_details_deserialize() {
        let raw = r#"[{
            "Id": "abc123",
            "Name": "/example",
            "Image": "sha256:deadbeef",
            "State": {"Running": true},
            "Mounts": [
                {"Name": "namevolume",
                 "Source": "/var/lib/docker/volumes/namevolume/_data",
                 "Destination": "/var/log"}
            ]
        }]"#;
        let parsed: Vec<ContainerDetails> = serde_json::from_str(raw).unwrap();
        let details = &parsed[0];
        assert!(details.running());
        assert_eq!(details.mounts.len(), 1);
        assert_eq!(details.mounts[0].name.as_deref(), Some("namevolume"));
        assert_eq!(details.mounts[0].destination, "/var/log");
    }

    #[test]
    fn image_created_parses_rfc3339() {
        let details = ImageDetails {
            id: "sha256:deadbeef".into(),
            created: "2016-04-08T18:12:12.764735522Z".into(),
        };
        let created = details.created_at().unwrap();
        assert_eq!(created.timestamp(), 1_460_139_132);
    }
}
