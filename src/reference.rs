//! Image reference parsing and rendering.
//!
//! References take the shape `[registry[:port]/]image[:tag]`. Parsing is
//! deliberately permissive — it accepts a superset of what the engine
//! allows (slashes in odd places, adjacent periods) and leaves
//! validation to the engine, which is the only authority anyway.

use std::fmt;

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host, when one is present.
    pub domain: Option<String>,
    /// Registry port, kept as written.
    pub port: Option<String>,
    /// Image path (`team/app`).
    pub image: String,
    /// Tag; defaults to `latest`.
    pub tag: String,
}

impl ImageRef {
    /// Parse a combined reference string.
    ///
    /// The leading segment counts as a registry when it is `localhost`,
    /// contains a dot, or carries a port — the same heuristic the engine
    /// uses to tell `registry.example.com/app` from `team/app`.
    #[must_use]
    pub fn parse(text: &str) -> ImageRef {
        let (domain, port, rest) = match text.split_once('/') {
            Some((head, rest)) if looks_like_registry(head) => match head.split_once(':') {
                Some((host, port)) => (
                    Some(host.to_string()),
                    Some(port.to_string()),
                    rest.to_string(),
                ),
                None => (Some(head.to_string()), None, rest.to_string()),
            },
            _ => (None, None, text.to_string()),
        };
        let (image, tag) = match rest.rsplit_once(':') {
            Some((image, tag)) if !tag.contains('/') => (image.to_string(), tag.to_string()),
            _ => (rest, "latest".to_string()),
        };
        ImageRef {
            domain,
            port,
            image,
            tag,
        }
    }

    /// The registry endpoint, `host[:port]`, when a registry is present.
    #[must_use]
    pub fn registry(&self) -> Option<String> {
        self.domain.as_ref().map(|domain| match &self.port {
            Some(port) => format!("{domain}:{port}"),
            None => domain.clone(),
        })
    }

    /// The name handed to a pull operation: `registry/image`, with no
    /// tag. The engine's pull endpoint treats the registry as part of
    /// the image name.
    #[must_use]
    pub fn pull_name(&self) -> String {
        match self.registry() {
            Some(registry) => format!("{registry}/{}", self.image),
            None => self.image.clone(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = self.registry() {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}:{}", self.image, self.tag)
    }
}

fn looks_like_registry(segment: &str) -> bool {
    !segment.is_empty() && (segment == "localhost" || segment.contains('.') || segment.contains(':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_image_defaults_to_latest() {
        let r = ImageRef::parse("busybox");
        assert_eq!(r.domain, None);
        assert_eq!(r.port, None);
        assert_eq!(r.image, "busybox");
        assert_eq!(r.tag, "latest");
        assert_eq!(r.to_string(), "busybox:latest");
        assert_eq!(r.pull_name(), "busybox");
    }

    #[test]
    fn full_reference_round_trips() {
        let text = "registry.example.com:5000/team/app:dev";
        let r = ImageRef::parse(text);
        assert_eq!(r.domain.as_deref(), Some("registry.example.com"));
        assert_eq!(r.port.as_deref(), Some("5000"));
        assert_eq!(r.image, "team/app");
        assert_eq!(r.tag, "dev");
        assert_eq!(r.registry().as_deref(), Some("registry.example.com:5000"));
        assert_eq!(r.pull_name(), "registry.example.com:5000/team/app");
        assert_eq!(r.to_string(), text);
        assert_eq!(ImageRef::parse(&r.to_string()), r);
    }

    #[test]
    fn registry_without_port() {
        let r = ImageRef::parse("docker.example.com/my-image:dev");
        assert_eq!(r.domain.as_deref(), Some("docker.example.com"));
        assert_eq!(r.port, None);
        assert_eq!(r.image, "my-image");
        assert_eq!(r.tag, "dev");
    }

    #[test]
    fn namespaced_image_is_not_a_registry() {
        let r = ImageRef::parse("team/app:1.0");
        assert_eq!(r.domain, None);
        assert_eq!(r.image, "team/app");
        assert_eq!(r.tag, "1.0");
    }

    #[test]
    fn localhost_counts_as_a_registry() {
        let r = ImageRef::parse("localhost/app");
        assert_eq!(r.domain.as_deref(), Some("localhost"));
        assert_eq!(r.image, "app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn bare_host_with_port_counts_as_a_registry() {
        let r = ImageRef::parse("registry:5000/app:dev");
        assert_eq!(r.domain.as_deref(), Some("registry"));
        assert_eq!(r.port.as_deref(), Some("5000"));
        assert_eq!(r.image, "app");
        assert_eq!(r.tag, "dev");
    }

    #[test]
    fn round_trips_across_field_combinations() {
        for text in [
            "ubuntu:latest",
            "ubuntu:14.04",
            "my-image:dev",
            "docker.example.com/my-image:latest",
            "docker.example.com:5000/my-image:dev",
            "localhost:5000/team/app:latest",
        ] {
            assert_eq!(ImageRef::parse(text).to_string(), text, "{text}");
        }
    }
}
