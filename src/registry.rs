//! Registry freshness probe.
//!
//! Talks to a V2 registry over HTTPS to answer one question: is the
//! registry's copy of an image newer than the local one? Trust is
//! per-endpoint: the engine's certificate directory is probed file by
//! file and the first anchor the endpoint accepts wins. Credentials come
//! from the engine's own config file, so `docker login` is the single
//! source of auth.
//!
//! Insecure registries, V1 registries, and the public hub are out of
//! scope; a reference without a registry is never probed.

use crate::engine::{Engine, InspectImage};
use crate::errors::{Error, Result};
use crate::reference::ImageRef;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Where trust anchors and credentials are looked up. Overridable so
/// tests can point at scratch directories.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Skip TLS verification entirely.
    pub no_verify: bool,
    /// Whether a pull will follow; probe failures become fatal.
    pub pull_intended: bool,
    /// Root of the per-endpoint certificate directories.
    pub cert_root: PathBuf,
    /// The engine config file carrying `auths`.
    pub config_file: Option<PathBuf>,
}

impl Default for RegistryOptions {
    fn default() -> RegistryOptions {
        RegistryOptions {
            no_verify: false,
            pull_intended: false,
            cert_root: PathBuf::from("/etc/docker/certs.d"),
            config_file: home::home_dir().map(|h| h.join(".docker/config.json")),
        }
    }
}

/// An authenticated session with one registry endpoint.
#[derive(Debug)]
pub struct RegistryClient {
    endpoint: String,
    base: String,
    client: reqwest::Client,
    auth: Option<(String, String)>,
}

impl RegistryClient {
    /// Establish a session with `domain[:port]`.
    ///
    /// # Errors
    ///
    /// [`Error::RegistryUnreachable`] when the endpoint cannot be
    /// contacted, and [`Error::AuthMissing`] when the endpoint demands
    /// credentials, a pull is intended, and we have none that work.
    pub async fn connect(
        domain: &str,
        port: Option<&str>,
        options: &RegistryOptions,
    ) -> Result<RegistryClient> {
        let endpoint = match port {
            Some(port) => format!("{domain}:{port}"),
            None => domain.to_string(),
        };
        let auth = discover_auth(&endpoint, options.config_file.as_deref());
        let client = select_client(&endpoint, options).await?;
        let registry = RegistryClient {
            base: format!("https://{endpoint}/v2"),
            endpoint,
            client,
            auth,
        };
        registry.probe(options.pull_intended).await?;
        Ok(registry)
    }

    /// The `host[:port]` endpoint this session talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get(&self, url: String) -> Result<reqwest::Response> {
        let mut request = self.client.get(&url);
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }
        request.send().await.map_err(|e| Error::RegistryUnreachable {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })
    }

    async fn probe(&self, pull_intended: bool) -> Result<()> {
        let response = self.get(format!("https://{}/v0", self.endpoint)).await?;
        let status = response.status().as_u16();
        match status {
            401 => {
                println!(
                    "You are not logged into registry {}\nRun docker login",
                    self.endpoint
                );
                if pull_intended {
                    return Err(Error::AuthMissing {
                        endpoint: self.endpoint.clone(),
                    });
                }
            }
            200 | 404 => {}
            _ => {
                let body = response.text().await.unwrap_or_default();
                println!("{status} {body}");
                if pull_intended {
                    return Err(Error::RegistryUnreachable {
                        endpoint: self.endpoint.clone(),
                        message: format!("unexpected status {status}"),
                    });
                }
            }
        }
        Ok(())
    }

    /// The manifest document for `image:tag`, or `None` on any non-200.
    pub async fn manifest(&self, image: &str, tag: &str) -> Result<Option<Json>> {
        let response = self
            .get(format!("{}/{image}/manifests/{tag}", self.base))
            .await?;
        if response.status().as_u16() != 200 {
            return Ok(None);
        }
        Ok(response.json().await.ok())
    }

    /// Digest of the image's top layer, or `None` when absent.
    pub async fn image_id(&self, image: &str, tag: &str) -> Result<Option<String>> {
        Ok(self.manifest(image, tag).await?.and_then(|m| {
            m.get("fsLayers")?
                .get(0)?
                .get("blobSum")?
                .as_str()
                .map(str::to_string)
        }))
    }

    /// The image's build timestamp from the first history entry, or
    /// `None` when the image or the field is absent.
    pub async fn build_timestamp(&self, image: &str, tag: &str) -> Result<Option<DateTime<Utc>>> {
        let Some(manifest) = self.manifest(image, tag).await? else {
            return Ok(None);
        };
        Ok(extract_build_timestamp(&manifest))
    }

    /// Tags published for an image, empty when absent.
    pub async fn tags(&self, image: &str) -> Result<Vec<String>> {
        let response = self.get(format!("{}/{image}/tags/list", self.base)).await?;
        if response.status().as_u16() != 200 {
            return Ok(Vec::new());
        }
        let body: Json = match response.json().await {
            Ok(body) => body,
            Err(_) => return Ok(Vec::new()),
        };
        Ok(body
            .get("tags")
            .and_then(Json::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Json::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Manifest history entries carry the legacy image config as a JSON
/// string; the build date lives inside it.
fn extract_build_timestamp(manifest: &Json) -> Option<DateTime<Utc>> {
    let compat = manifest.get("history")?.get(0)?.get("v1Compatibility")?;
    let inner: Json = serde_json::from_str(compat.as_str()?).ok()?;
    let created = inner.get("created")?.as_str()?;
    DateTime::parse_from_rfc3339(created)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Read the engine config's `auths` table and return decoded basic-auth
/// credentials for this endpoint, when an entry matches. Unparseable
/// files and entries are logged and skipped.
fn discover_auth(endpoint: &str, config_file: Option<&std::path::Path>) -> Option<(String, String)> {
    let path = config_file?;
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Json = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "engine config file is not valid JSON");
            return None;
        }
    };
    let entry = parsed
        .get("auths")?
        .get(format!("https://{endpoint}"))
        .or_else(|| parsed.get("auths")?.get(endpoint))?;
    let encoded = entry.get("auth")?.as_str()?;
    let decoded = match base64::engine::general_purpose::STANDARD.decode(encoded) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(endpoint, error = %e, "auth entry is not valid base64");
            return None;
        }
    };
    let decoded = String::from_utf8_lossy(&decoded).into_owned();
    let (user, pass) = decoded.split_once(':')?;
    debug!(endpoint, "using credentials from the engine config");
    Some((user.to_string(), pass.to_string()))
}

/// Pick a trust anchor for the endpoint. Every file in the endpoint's
/// certificate directory is tried against a `GET /` probe; the first
/// one the endpoint accepts wins. With `no_verify`, verification is
/// skipped entirely.
async fn select_client(endpoint: &str, options: &RegistryOptions) -> Result<reqwest::Client> {
    if options.no_verify {
        return reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(Error::from);
    }
    let certdir = options.cert_root.join(endpoint);
    if certdir.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&certdir)
            .map_err(|e| Error::io(format!("reading {}", certdir.display()), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        for certfile in entries {
            debug!(certfile = %certfile.display(), "trying trust anchor");
            let Ok(pem) = std::fs::read(&certfile) else {
                continue;
            };
            let Ok(cert) = reqwest::Certificate::from_pem(&pem) else {
                debug!(certfile = %certfile.display(), "not a usable certificate");
                continue;
            };
            let Ok(client) = reqwest::Client::builder().add_root_certificate(cert).build() else {
                continue;
            };
            match client.get(format!("https://{endpoint}/")).send().await {
                Ok(_) => {
                    debug!(certfile = %certfile.display(), "trust anchor accepted");
                    return Ok(client);
                }
                Err(e) => {
                    debug!(certfile = %certfile.display(), error = %e, "trust anchor rejected");
                }
            }
        }
    }
    reqwest::Client::builder().build().map_err(Error::from)
}

/// Whether the registry's copy of `upstream` is newer than the local
/// one. Absent locally means yes; absent remotely means no.
pub async fn image_is_newer(
    engine: &Engine,
    upstream: &ImageRef,
    options: &RegistryOptions,
) -> Result<bool> {
    if upstream.image == "scratch" {
        return Err(Error::Unsupported {
            message: "building FROM scratch is not supported".to_string(),
        });
    }
    if upstream.registry().is_none() {
        // No registry to ask; the hub is not probed.
        return Ok(true);
    }
    let domain = upstream.domain.as_deref().unwrap_or_default();
    let registry = RegistryClient::connect(domain, upstream.port.as_deref(), options).await?;
    let Some(remote) = registry
        .build_timestamp(&upstream.image, &upstream.tag)
        .await?
    else {
        warn!(image = %upstream, "image does not exist in the registry");
        return Ok(false);
    };
    let local = InspectImage::new(upstream.to_string())
        .query(engine)
        .await?
        .and_then(|details| details.created_at());
    match local {
        None => {
            warn!(image = %upstream, "image does not exist locally");
            Ok(true)
        }
        Some(local) => Ok(remote > local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn auth_discovery_decodes_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        let encoded = base64::engine::general_purpose::STANDARD.encode("user:sekrit");
        let mut f = std::fs::File::create(&config).unwrap();
        write!(
            f,
            r#"{{"auths": {{"https://registry.example.com:5000": {{"auth": "{encoded}"}}}}}}"#
        )
        .unwrap();
        let auth = discover_auth("registry.example.com:5000", Some(&config));
        assert_eq!(auth, Some(("user".to_string(), "sekrit".to_string())));
        assert_eq!(discover_auth("other.example.com", Some(&config)), None);
    }

    #[test]
    fn unparseable_config_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, "not json").unwrap();
        assert_eq!(discover_auth("registry.example.com", Some(&config)), None);
    }

    #[test]
    fn build_timestamp_is_read_from_the_first_history_entry() {
        let manifest: Json = serde_json::from_str(
            r#"{"history": [
                {"v1Compatibility": "{\"created\": \"2016-04-08T18:12:12.764735522Z\"}"},
                {"v1Compatibility": "{\"created\": \"2010-01-01T00:00:00Z\"}"}
            ]}"#,
        )
        .unwrap();
        let stamp = extract_build_timestamp(&manifest).unwrap();
        assert_eq!(stamp.timestamp(), 1_460_139_132);
    }

    #[test]
    fn missing_created_field_yields_none() {
        let manifest: Json =
            serde_json::from_str(r#"{"history": [{"v1Compatibility": "{}"}]}"#).unwrap();
        assert!(extract_build_timestamp(&manifest).is_none());
    }
}
