//! Error taxonomy and exit-code mapping.
//!
//! Engine failures arrive as human-readable text on stderr; the
//! classifier in [`crate::engine`] turns the known shapes into the typed
//! variants here so the rest of the program never string-matches. The
//! process exit code is a function of the error kind: `2` for pre-check
//! failures (bad descriptor, no engine), `3` for operation pre-checks
//! (missing image name, unreachable or unauthenticated registry when a
//! pull is required), `1` for everything that failed while operating.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes the orchestrator distinguishes.
#[derive(Debug, Error)]
pub enum Error {
    /// The project descriptor is missing, unparseable, or semantically
    /// incomplete.
    #[error("invalid descriptor {path}: {reason}")]
    InvalidDescriptor {
        /// Descriptor file the problem was found in.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// The container engine could not be found or contacted.
    #[error("container engine unreachable: {message}")]
    EngineUnreachable {
        /// Details of the failed handshake.
        message: String,
    },

    /// A registry endpoint could not be contacted.
    #[error("registry {endpoint} could not be contacted: {message}")]
    RegistryUnreachable {
        /// The `host[:port]` endpoint.
        endpoint: String,
        /// Transport-level detail.
        message: String,
    },

    /// The registry demanded credentials we do not have.
    #[error("not logged into registry {endpoint}")]
    AuthMissing {
        /// The `host[:port]` endpoint.
        endpoint: String,
    },

    /// A verb needed information that is not available.
    #[error("{message}")]
    PreFlightMissing {
        /// What was missing.
        message: String,
    },

    /// An option key that no service bucket recognizes.
    #[error("unknown option key: {key}")]
    UnknownOption {
        /// The rejected key, after alias rewriting.
        key: String,
    },

    /// A lookup for an option the service does not carry.
    #[error("option not set: {key}")]
    MissingOption {
        /// The requested key, after alias rewriting.
        key: String,
    },

    /// A container with this name already exists.
    #[error("container already exists: {detail}")]
    ContainerAlreadyExists {
        /// Engine explanation.
        detail: String,
    },

    /// The named container does not exist.
    #[error("container does not exist: {name}")]
    ContainerAbsent {
        /// The container name.
        name: String,
    },

    /// The engine believes a volume exists that it cannot use.
    #[error("the engine is caching a volume it cannot reuse: {detail}")]
    VolumePseudoExists {
        /// Engine explanation.
        detail: String,
    },

    /// An anonymous volume was requested where only named or bound
    /// volumes are allowed.
    #[error("transient volumes are not allowed; name the volume or bind it to the host: {detail}")]
    TransientVolumeRejected {
        /// Engine explanation.
        detail: String,
    },

    /// The engine rejected a volume name at create time.
    #[error("invalid volume name: {detail}")]
    InvalidVolumeName {
        /// Engine explanation.
        detail: String,
    },

    /// A volume a container binding references vanished before start.
    #[error("volume not found: {detail}")]
    VolumeNotFound {
        /// Engine explanation.
        detail: String,
    },

    /// A host-side bind path could not be created.
    #[error("invalid host binding: {detail}")]
    InvalidHostBinding {
        /// Engine explanation.
        detail: String,
    },

    /// The image is not present.
    #[error("image does not exist: {image}")]
    ImageMissing {
        /// The image reference.
        image: String,
    },

    /// The container name is held by another container.
    #[error("name is already in use: {detail}")]
    NameInUse {
        /// Engine explanation.
        detail: String,
    },

    /// A pre/post-build hook exited non-zero.
    #[error("{event} hook for {service} exited with status {status}")]
    EventHookFailed {
        /// Which hook.
        event: String,
        /// The service it ran for.
        service: String,
        /// Its exit status.
        status: i32,
    },

    /// An engine invocation failed in a way we do not classify.
    #[error("engine command failed ({status}): {stderr}")]
    EngineCommand {
        /// The subcommand that failed.
        command: String,
        /// Its exit status.
        status: i32,
        /// Raw stderr, for the debug log.
        stderr: String,
    },

    /// An operation the orchestrator refuses to perform.
    #[error("{message}")]
    Unsupported {
        /// Why it is refused.
        message: String,
    },

    /// The user interrupted the run.
    #[error("interrupted")]
    Interrupted,

    /// Filesystem trouble outside the descriptor-parsing path.
    #[error("io error during {operation}: {source}")]
    Io {
        /// What we were doing.
        operation: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport failure talking to a registry.
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Helper for wrapping IO errors with the operation that hit them.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Error {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    /// The process exit code this error maps to.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidDescriptor { .. } | Error::EngineUnreachable { .. } => 2,
            Error::RegistryUnreachable { .. }
            | Error::AuthMissing { .. }
            | Error::PreFlightMissing { .. } => 3,
            Error::Interrupted => 130,
            _ => 1,
        }
    }

    /// Whether a failure is scoped to one service and the iteration
    /// should carry on with the remaining ones.
    #[must_use]
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            Error::ContainerAlreadyExists { .. }
                | Error::ContainerAbsent { .. }
                | Error::VolumePseudoExists { .. }
                | Error::TransientVolumeRejected { .. }
                | Error::InvalidVolumeName { .. }
                | Error::VolumeNotFound { .. }
                | Error::InvalidHostBinding { .. }
                | Error::ImageMissing { .. }
                | Error::NameInUse { .. }
                | Error::EventHookFailed { .. }
                | Error::EngineCommand { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_the_contract() {
        let bad_descriptor = Error::InvalidDescriptor {
            path: "Controlfile".into(),
            reason: "not valid JSON".into(),
        };
        assert_eq!(bad_descriptor.exit_code(), 2);
        let no_engine = Error::EngineUnreachable {
            message: "socket missing".into(),
        };
        assert_eq!(no_engine.exit_code(), 2);
        let no_auth = Error::AuthMissing {
            endpoint: "registry.example.com".into(),
        };
        assert_eq!(no_auth.exit_code(), 3);
        let hook = Error::EventHookFailed {
            event: "prebuild".into(),
            service: "api".into(),
            status: 1,
        };
        assert_eq!(hook.exit_code(), 1);
        assert_eq!(Error::Interrupted.exit_code(), 130);
    }

    #[test]
    fn container_errors_are_recoverable() {
        let err = Error::NameInUse {
            detail: "is already in use by container abc".into(),
        };
        assert!(err.recoverable());
        let vanished = Error::VolumeNotFound {
            detail: "get: volume not found".into(),
        };
        assert!(vanished.recoverable());
        assert_eq!(vanished.exit_code(), 1);
        let fatal = Error::InvalidDescriptor {
            path: "Controlfile".into(),
            reason: "missing image".into(),
        };
        assert!(!fatal.recoverable());
    }
}
