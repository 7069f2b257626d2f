//! Engine error classification.
//!
//! The engine explains failures as free text. This module is the only
//! place that text is inspected: a substring table maps the known shapes
//! onto the typed error kinds, and anything unrecognized is wrapped as
//! an opaque engine failure carrying the original text for the debug
//! log.

use crate::errors::Error;
use tracing::debug;

/// Turn a failed invocation's stderr into a typed error.
#[must_use]
pub fn classify(subcommand: &str, status: i32, stderr: &str) -> Error {
    let text = stderr.trim();

    // Ordering matters: "get: volume not found" is a start-time binding
    // failure and must win over the generic volume-not-found match.
    if text.contains("get: volume not found") {
        return Error::VolumeNotFound {
            detail: text.to_string(),
        };
    }
    if text.contains("volume not found") {
        return Error::TransientVolumeRejected {
            detail: text.to_string(),
        };
    }
    if text.contains("chown") {
        return Error::VolumePseudoExists {
            detail: text.to_string(),
        };
    }
    if text.contains("volume name invalid") {
        return Error::InvalidVolumeName {
            detail: text.to_string(),
        };
    }
    if text.contains("is already in use by container") {
        return Error::NameInUse {
            detail: text.to_string(),
        };
    }
    if text.contains("No such image") {
        return Error::ImageMissing {
            image: text.to_string(),
        };
    }
    if text.contains("No such container") || text.contains("No such object") {
        return Error::ContainerAbsent {
            name: text.to_string(),
        };
    }
    if is_forbidden_mkdir(text) {
        return Error::InvalidHostBinding {
            detail: text.to_string(),
        };
    }

    debug!(subcommand, status, stderr = text, "unclassified engine error");
    Error::EngineCommand {
        command: subcommand.to_string(),
        status,
        stderr: text.to_string(),
    }
}

/// Matches `mkdir <path>: operation not permitted`, the engine's way of
/// saying a host bind path could not be created.
fn is_forbidden_mkdir(text: &str) -> bool {
    text.split("mkdir ")
        .skip(1)
        .any(|rest| rest.contains(": operation not permitted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_binding_failure_beats_transient_volume() {
        let err = classify("start", 1, "Error response from daemon: get: volume not found");
        assert!(matches!(err, Error::VolumeNotFound { .. }));
    }

    #[test]
    fn invalid_volume_name_stays_a_create_time_error() {
        let err = classify("create", 1, "Error response from daemon: volume name invalid");
        assert!(matches!(err, Error::InvalidVolumeName { .. }));
    }

    #[test]
    fn transient_volume_is_detected() {
        let err = classify("create", 1, "Error response from daemon: volume not found");
        assert!(matches!(err, Error::TransientVolumeRejected { .. }));
    }

    #[test]
    fn chown_marks_a_pseudo_existing_volume() {
        let err = classify("create", 1, "failed to chown /var/lib/docker/volumes/x");
        assert!(matches!(err, Error::VolumePseudoExists { .. }));
    }

    #[test]
    fn name_collision_is_detected() {
        let err = classify(
            "create",
            1,
            "Conflict. The container name \"/api\" is already in use by container abc",
        );
        assert!(matches!(err, Error::NameInUse { .. }));
    }

    #[test]
    fn missing_image_is_detected() {
        let err = classify("create", 1, "Unable to find image: No such image: app:dev");
        assert!(matches!(err, Error::ImageMissing { .. }));
    }

    #[test]
    fn forbidden_mkdir_is_an_invalid_host_binding() {
        let err = classify(
            "start",
            1,
            "error while creating mount source path: mkdir /host/data: operation not permitted",
        );
        assert!(matches!(err, Error::InvalidHostBinding { .. }));
    }

    #[test]
    fn unknown_text_stays_opaque() {
        let err = classify("create", 125, "some novel failure");
        match err {
            Error::EngineCommand {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "create");
                assert_eq!(status, 125);
                assert_eq!(stderr, "some novel failure");
            }
            other => panic!("expected opaque engine error, got {other:?}"),
        }
    }
}
