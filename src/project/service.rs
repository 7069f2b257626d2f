//! The unit service model.
//!
//! A service is three buckets: service-level metadata the orchestrator
//! itself consumes, container-create options, and host-side runtime
//! options. Descriptor keys route into a bucket through a fixed option
//! domain table, with a small alias pass (`cmd`→`command`,
//! `env`→`environment`, `envfile`→`env_file`) applied on every access.
//! Unknown keys are typed errors, never silent writes.
//!
//! `volumes` is a pseudo-key: services keep a dev/prod-aware volume map
//! keyed by `shared`/`dev`/`prod`, reads return the concatenation, and
//! writes with a list land in `shared`.

use crate::dump::{CommandLine, Style};
use crate::engine::CreateSpec;
use crate::errors::{Error, Result};
use crate::reference::ImageRef;
use crate::substitute::{self, VarMap};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Keys held on the service record itself.
const SERVICE_OPTIONS: &[&str] = &[
    "commands",
    "controlfile",
    "dockerfile",
    "env_file",
    "events",
    "expected_timeout",
    "fromline",
    "image",
    "open",
    "required",
    "service",
    "services",
    "volumes",
];

/// Keys in the container-create domain.
const CONTAINER_OPTIONS: &[&str] = &[
    "command",
    "detach",
    "domainname",
    "entrypoint",
    "environment",
    "hostname",
    "labels",
    "mac_address",
    "name",
    "network_disabled",
    "ports",
    "stdin_open",
    "stop_signal",
    "tty",
    "user",
    "working_dir",
];

/// Keys in the host-config domain.
const HOST_OPTIONS: &[&str] = &[
    "cap_add",
    "cap_drop",
    "devices",
    "dns",
    "dns_search",
    "extra_hosts",
    "group_add",
    "ipc_mode",
    "links",
    "network_mode",
    "port_bindings",
    "privileged",
    "read_only",
    "restart_policy",
    "security_opt",
    "shm_size",
    "volumes_from",
];

/// Keys whose unset value reads as an empty list rather than an empty
/// string.
const LIST_DEFAULTS: &[&str] = &[
    "command",
    "devices",
    "dns",
    "dns_search",
    "entrypoint",
    "environment",
    "ports",
    "volumes_from",
];

fn alias(key: &str) -> &str {
    match key {
        "cmd" => "command",
        "env" => "environment",
        "envfile" => "env_file",
        other => other,
    }
}

/// The dev/prod split for builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Development builds and volumes.
    Dev,
    /// Production builds and volumes.
    Prod,
}

impl Environment {
    /// The descriptor key for this environment.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

/// A per-environment pair of strings (dockerfile paths, FROM lines).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPair {
    /// Development value; empty when unset.
    pub dev: String,
    /// Production value; empty when unset.
    pub prod: String,
}

impl EnvPair {
    /// The value for one environment.
    #[must_use]
    pub fn get(&self, env: Environment) -> &str {
        match env {
            Environment::Dev => &self.dev,
            Environment::Prod => &self.prod,
        }
    }

    fn from_value(value: &Value) -> EnvPair {
        match value {
            Value::Map(entries) => EnvPair {
                dev: entries.get("dev").map(Value::render).unwrap_or_default(),
                prod: entries.get("prod").map(Value::render).unwrap_or_default(),
            },
            scalar => {
                let s = scalar.render();
                EnvPair {
                    dev: s.clone(),
                    prod: s,
                }
            }
        }
    }

    fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("dev".to_string(), Value::str(self.dev.clone()));
        map.insert("prod".to_string(), Value::str(self.prod.clone()));
        Value::Map(map)
    }
}

/// The dev/prod-aware volume map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeSet {
    /// Volumes mounted in every environment.
    pub shared: Vec<String>,
    /// Development-only volumes.
    pub dev: Vec<String>,
    /// Production-only volumes.
    pub prod: Vec<String>,
}

impl VolumeSet {
    /// All volumes in read order: shared, dev, prod.
    #[must_use]
    pub fn all(&self) -> Vec<String> {
        let mut out = self.shared.clone();
        out.extend(self.dev.iter().cloned());
        out.extend(self.prod.iter().cloned());
        out
    }

    /// Shared plus environment-specific volumes.
    #[must_use]
    pub fn for_env(&self, env: Environment) -> Vec<String> {
        let mut out = self.shared.clone();
        match env {
            Environment::Dev => out.extend(self.dev.iter().cloned()),
            Environment::Prod => out.extend(self.prod.iter().cloned()),
        }
        out
    }

    fn update(&mut self, value: &Value) {
        match value {
            Value::List(_) => self.shared = value.as_strings(),
            Value::Map(entries) => {
                for (key, specs) in entries {
                    let specs = specs.as_strings();
                    match key.as_str() {
                        "shared" => self.shared = specs,
                        "dev" => self.dev = specs,
                        "prod" => self.prod = specs,
                        other => debug!(bucket = other, "ignoring unknown volume bucket"),
                    }
                }
            }
            scalar => self.shared = vec![scalar.render()],
        }
    }
}

/// Split a volume list for container creation.
///
/// Specs are one of `container_path`, `host_or_named:container_path`,
/// and `host_or_named:container_path:mode`. The create payload wants
/// every container-side path; the bind list wants only the specs with a
/// host component, verbatim.
#[must_use]
pub fn split_volumes(volumes: &[String]) -> (Vec<String>, Vec<String>) {
    let paths = volumes
        .iter()
        .filter_map(|spec| spec.split(':').take(2).last())
        .map(str::to_string)
        .collect();
    let binds = volumes
        .iter()
        .filter(|spec| spec.contains(':'))
        .cloned()
        .collect();
    (paths, binds)
}

/// Build-time knobs reflected in a dumped build command line.
#[derive(Debug, Clone, Copy)]
pub struct BuildDump {
    /// Refresh the base image.
    pub pull: bool,
    /// Remove intermediate containers on success.
    pub rm: bool,
    /// Always remove intermediate containers.
    pub force_rm: bool,
    /// Use the layer cache.
    pub cache: bool,
}

/// A resolved unit service.
#[derive(Debug, Clone)]
pub struct Service {
    /// Registry key.
    pub name: String,
    /// Descriptor file this service came from.
    pub source: PathBuf,
    /// Image reference string.
    pub image: String,
    /// Member of the `required` group unless opted out.
    pub required: bool,
    /// Whether a container block was declared.
    pub startable: bool,
    /// Graceful stop timeout in seconds.
    pub expected_timeout: u32,
    /// Per-environment source descriptor paths; empty when not
    /// buildable.
    pub dockerfile: EnvPair,
    /// Per-environment FROM-line overrides.
    pub fromline: EnvPair,
    /// Event hooks (`prebuild`, `postbuild`), scalar or env-keyed map.
    pub events: IndexMap<String, Value>,
    /// The `open` directive, when declared.
    pub open_spec: Option<Value>,
    /// Named command table.
    pub commands: IndexMap<String, String>,
    /// Environment file path; empty when unset.
    pub env_file: String,
    /// Dev/prod-aware volumes.
    pub volumes: VolumeSet,
    /// Container-create options.
    pub container: IndexMap<String, Value>,
    /// Host-config options.
    pub host_config: IndexMap<String, Value>,
}

impl Service {
    /// Build a service from a descriptor map.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDescriptor`] when the descriptor has no image or
    /// is not a map.
    pub fn from_descriptor(data: &Value, source: &Path) -> Result<Service> {
        let invalid = |reason: &str| Error::InvalidDescriptor {
            path: source.to_path_buf(),
            reason: reason.to_string(),
        };
        let map = data.as_map().ok_or_else(|| invalid("not a map"))?;

        let image = map
            .get("image")
            .map(Value::render)
            .ok_or_else(|| invalid("missing image"))?;
        if image.is_empty() {
            return Err(invalid("missing image"));
        }

        let mut service = Service {
            name: map.get("service").map(Value::render).unwrap_or_default(),
            source: source.to_path_buf(),
            image,
            required: map.get("required").map_or_else(
                || !map.get("optional").is_some_and(Value::truthy),
                Value::truthy,
            ),
            startable: map.contains_key("container"),
            expected_timeout: map
                .get("expected_timeout")
                .map(|v| v.render().parse().unwrap_or(10))
                .unwrap_or(10),
            dockerfile: EnvPair::default(),
            fromline: map.get("fromline").map(EnvPair::from_value).unwrap_or_default(),
            events: map
                .get("events")
                .and_then(Value::as_map)
                .cloned()
                .unwrap_or_default(),
            open_spec: map.get("open").cloned(),
            commands: map
                .get("commands")
                .and_then(Value::as_map)
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.render())).collect())
                .unwrap_or_default(),
            env_file: map.get("env_file").map(Value::render).unwrap_or_default(),
            volumes: VolumeSet::default(),
            container: IndexMap::new(),
            host_config: IndexMap::new(),
        };
        if service.expected_timeout == 0 {
            return Err(invalid("expected_timeout must be a positive integer"));
        }

        service.dockerfile = discover_dockerfile(map.get("dockerfile"), source);

        if let Some(block) = map.get("container") {
            let block = block
                .as_map()
                .ok_or_else(|| invalid("container block is not a map"))?;
            for (raw_key, value) in block {
                let key = alias(raw_key);
                match key {
                    "volumes" => service.volumes.update(value),
                    "env_file" => service.env_file = value.render(),
                    _ if CONTAINER_OPTIONS.contains(&key) => {
                        service.container.insert(key.to_string(), value.clone());
                    }
                    _ if HOST_OPTIONS.contains(&key) => {
                        service.host_config.insert(key.to_string(), value.clone());
                    }
                    other => {
                        debug!(key = other, "throwing out unrecognized container option");
                    }
                }
            }
        }

        // Name derivation: explicit service field, then the container
        // name, then the image path.
        if service.name.is_empty() {
            if let Some(name) = service.container.get("name") {
                service.name = name.render();
            } else {
                service.name = ImageRef::parse(&service.image).image;
            }
        }
        service.fill_in_holes();
        Ok(service)
    }

    /// Fill defaults that depend on other fields: the container name
    /// mirrors the service name, the hostname mirrors the container
    /// name.
    fn fill_in_holes(&mut self) {
        if !self.startable {
            return;
        }
        if !self.container.contains_key("name") {
            self.container
                .insert("name".to_string(), Value::str(self.name.clone()));
        }
        if !self.container.contains_key("hostname") {
            let name = self.container["name"].clone();
            self.container.insert("hostname".to_string(), name);
        }
    }

    /// Whether this service can produce an image.
    #[must_use]
    pub fn buildable(&self) -> bool {
        !self.dockerfile.dev.is_empty() || !self.dockerfile.prod.is_empty()
    }

    /// The parsed image reference.
    #[must_use]
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::parse(&self.image)
    }

    /// The container name; always present for startable services.
    #[must_use]
    pub fn container_name(&self) -> String {
        self.container
            .get("name")
            .map(Value::render)
            .unwrap_or_else(|| self.name.clone())
    }

    /// Deterministic iteration key.
    #[must_use]
    pub fn sort_key(&self) -> (String, String) {
        (self.name.clone(), self.container_name())
    }

    /// Whether a key routes somewhere, after alias rewriting.
    #[must_use]
    pub fn recognizes(&self, key: &str) -> bool {
        let key = alias(key);
        SERVICE_OPTIONS.contains(&key)
            || CONTAINER_OPTIONS.contains(&key)
            || HOST_OPTIONS.contains(&key)
    }

    /// The current value of a key, without defaults. Used by the
    /// transform pass, where "absent" matters.
    #[must_use]
    pub fn current(&self, key: &str) -> Option<Value> {
        let key = alias(key);
        match key {
            // Transforms see the volume buckets, not the flattened
            // pseudo-key read, so environment-labelled operands land in
            // the right bucket.
            "volumes" => {
                let bucket = |specs: &[String]| {
                    Value::List(specs.iter().cloned().map(Value::Str).collect())
                };
                let mut map = IndexMap::new();
                map.insert("shared".to_string(), bucket(&self.volumes.shared));
                map.insert("dev".to_string(), bucket(&self.volumes.dev));
                map.insert("prod".to_string(), bucket(&self.volumes.prod));
                Some(Value::Map(map))
            }
            "service" => Some(Value::str(self.name.clone())),
            "image" => Some(Value::str(self.image.clone())),
            "required" => Some(Value::Bool(self.required)),
            "expected_timeout" => Some(Value::Num(self.expected_timeout.into())),
            "env_file" => {
                (!self.env_file.is_empty()).then(|| Value::str(self.env_file.clone()))
            }
            "controlfile" => Some(Value::str(self.source.display().to_string())),
            "dockerfile" => Some(self.dockerfile.to_value()),
            "fromline" => Some(self.fromline.to_value()),
            "open" => self.open_spec.clone(),
            "commands" => Some(Value::Map(
                self.commands
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::str(v.clone())))
                    .collect(),
            )),
            "events" => Some(Value::Map(self.events.clone())),
            _ if CONTAINER_OPTIONS.contains(&key) => self.container.get(key).cloned(),
            _ if HOST_OPTIONS.contains(&key) => self.host_config.get(key).cloned(),
            _ => None,
        }
    }

    /// Dictionary-style read with defaults for known-but-unset keys.
    ///
    /// # Errors
    ///
    /// [`Error::MissingOption`] for keys outside every domain or
    /// service-level keys that were never set.
    pub fn get(&self, key: &str) -> Result<Value> {
        let key = alias(key);
        if key == "volumes" {
            return Ok(Value::List(
                self.volumes.all().into_iter().map(Value::Str).collect(),
            ));
        }
        if let Some(value) = self.current(key) {
            return Ok(value);
        }
        if CONTAINER_OPTIONS.contains(&key) || HOST_OPTIONS.contains(&key) {
            return Ok(if LIST_DEFAULTS.contains(&key) {
                Value::List(Vec::new())
            } else {
                Value::Str(String::new())
            });
        }
        if key == "env_file" {
            return Ok(Value::Str(String::new()));
        }
        Err(Error::MissingOption {
            key: key.to_string(),
        })
    }

    /// Dictionary-style write.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownOption`] for keys outside every domain.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        let key = alias(key);
        match key {
            "volumes" => self.volumes.update(&value),
            "service" => self.name = value.render(),
            "image" => self.image = value.render(),
            "required" => self.required = value.truthy(),
            "expected_timeout" => {
                self.expected_timeout = value.render().parse().unwrap_or(self.expected_timeout);
            }
            "env_file" => self.env_file = value.render(),
            "controlfile" => self.source = PathBuf::from(value.render()),
            "dockerfile" => self.dockerfile = EnvPair::from_value(&value),
            "fromline" => self.fromline = EnvPair::from_value(&value),
            "open" => self.open_spec = Some(value),
            "commands" => {
                if let Some(map) = value.as_map() {
                    self.commands = map.iter().map(|(k, v)| (k.clone(), v.render())).collect();
                }
            }
            "events" => {
                if let Some(map) = value.as_map() {
                    self.events = map.clone();
                }
            }
            "services" => {}
            _ if CONTAINER_OPTIONS.contains(&key) => {
                self.container.insert(key.to_string(), value);
            }
            _ if HOST_OPTIONS.contains(&key) => {
                self.host_config.insert(key.to_string(), value);
            }
            _ => {
                return Err(Error::UnknownOption {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Dictionary-style delete. The image cannot be removed.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownOption`] for the image key and keys outside
    /// every domain.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let key = alias(key);
        if key == "image" {
            return Err(Error::UnknownOption {
                key: key.to_string(),
            });
        }
        if self.container.shift_remove(key).is_some()
            || self.host_config.shift_remove(key).is_some()
        {
            return Ok(());
        }
        match key {
            "volumes" => self.volumes = VolumeSet::default(),
            "env_file" => self.env_file.clear(),
            "open" => self.open_spec = None,
            "commands" => self.commands.clear(),
            "events" => self.events.clear(),
            "fromline" => self.fromline = EnvPair::default(),
            "dockerfile" => self.dockerfile = EnvPair::default(),
            _ => {
                return Err(Error::UnknownOption {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Substitute variables into every string leaf of the service.
    pub fn substitute_all(&mut self, vars: &VarMap) {
        let sub = |s: &mut String| {
            if let Some(replaced) = substitute::interpolate(s, vars) {
                *s = replaced;
            }
        };
        sub(&mut self.name);
        sub(&mut self.image);
        sub(&mut self.env_file);
        sub(&mut self.dockerfile.dev);
        sub(&mut self.dockerfile.prod);
        sub(&mut self.fromline.dev);
        sub(&mut self.fromline.prod);
        for command in self.commands.values_mut() {
            sub(command);
        }
        for volume in self
            .volumes
            .shared
            .iter_mut()
            .chain(self.volumes.dev.iter_mut())
            .chain(self.volumes.prod.iter_mut())
        {
            sub(volume);
        }
        self.events = self
            .events
            .iter()
            .map(|(k, v)| (k.clone(), substitute::substitute(v, vars)))
            .collect();
        if let Some(open) = &self.open_spec {
            self.open_spec = Some(substitute::substitute(open, vars));
        }
        self.container = self
            .container
            .iter()
            .map(|(k, v)| (k.clone(), substitute::substitute(v, vars)))
            .collect();
        self.host_config = self
            .host_config
            .iter()
            .map(|(k, v)| (k.clone(), substitute::substitute(v, vars)))
            .collect();
    }

    fn bucket(&self, key: &str) -> Option<&Value> {
        self.container.get(key).or_else(|| self.host_config.get(key))
    }

    fn bucket_string(&self, key: &str) -> Option<String> {
        self.bucket(key)
            .map(Value::render)
            .filter(|s| !s.is_empty())
    }

    fn bucket_strings(&self, key: &str) -> Vec<String> {
        self.bucket(key).map(Value::as_strings).unwrap_or_default()
    }

    fn bucket_bool(&self, key: &str) -> bool {
        self.bucket(key).is_some_and(Value::truthy)
    }

    /// The merged environment: env-file values first, explicit entries
    /// overriding on collision.
    fn merged_environment(&self) -> IndexMap<String, String> {
        let mut merged = IndexMap::new();
        if !self.env_file.is_empty() {
            match std::fs::read_to_string(&self.env_file) {
                Ok(content) => {
                    for line in content.lines() {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        if let Some((key, value)) = line.split_once('=') {
                            merged.insert(key.trim().to_string(), value.to_string());
                        }
                    }
                }
                Err(_) => warn!(env_file = %self.env_file, "env file is missing"),
            }
        }
        match self.container.get("environment") {
            Some(Value::Map(entries)) => {
                for (key, value) in entries {
                    merged.insert(key.clone(), value.render());
                }
            }
            Some(other) => {
                for entry in other.as_strings() {
                    match entry.split_once('=') {
                        Some((key, value)) => {
                            merged.insert(key.to_string(), value.to_string());
                        }
                        None => {
                            merged.insert(entry, String::new());
                        }
                    }
                }
            }
            None => {}
        }
        merged
    }

    /// The final engine payload for container creation.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the signature leaves room for
    /// stricter coercions.
    pub fn prepare_container_options(
        &self,
        env: Environment,
        no_volumes: bool,
    ) -> Result<CreateSpec> {
        let volume_list = if no_volumes {
            Vec::new()
        } else {
            self.volumes.for_env(env)
        };
        let (volumes, binds) = split_volumes(&volume_list);

        let (entrypoint, mut command_prefix) = match self.container.get("entrypoint") {
            Some(Value::List(items)) if !items.is_empty() => (
                Some(items[0].render()),
                items[1..].iter().map(Value::render).collect::<Vec<_>>(),
            ),
            Some(Value::List(_)) | None => (None, Vec::new()),
            Some(scalar) => {
                let rendered = scalar.render();
                ((!rendered.is_empty()).then_some(rendered), Vec::new())
            }
        };
        let command = match self.container.get("command") {
            Some(Value::List(items)) => items.iter().map(Value::render).collect(),
            Some(scalar) => {
                let rendered = scalar.render();
                if rendered.is_empty() {
                    Vec::new()
                } else {
                    shlex::split(&rendered)
                        .unwrap_or_else(|| rendered.split_whitespace().map(str::to_string).collect())
                }
            }
            None => Vec::new(),
        };
        command_prefix.extend(command);

        let mut ports = self.bucket_strings("ports");
        for binding in self.bucket_strings("port_bindings") {
            if !ports.contains(&binding) {
                ports.push(binding);
            }
        }

        let labels = match self.container.get("labels") {
            Some(Value::Map(entries)) => entries
                .iter()
                .map(|(k, v)| format!("{k}={}", v.render()))
                .collect(),
            Some(other) => other.as_strings(),
            None => Vec::new(),
        };

        Ok(CreateSpec {
            image: self.image.clone(),
            name: self.container_name(),
            hostname: self.bucket_string("hostname"),
            entrypoint,
            command: command_prefix,
            environment: self.merged_environment(),
            ports,
            volumes,
            binds,
            stdin_open: self.bucket_bool("stdin_open"),
            tty: self.bucket_bool("tty"),
            user: self.bucket_string("user"),
            working_dir: self.bucket_string("working_dir"),
            labels,
            domainname: self.bucket_string("domainname"),
            mac_address: self.bucket_string("mac_address"),
            stop_signal: self.bucket_string("stop_signal"),
            network_disabled: self.bucket_bool("network_disabled"),
            dns: self.bucket_strings("dns"),
            dns_search: self.bucket_strings("dns_search"),
            links: self.bucket_strings("links"),
            ipc_mode: self.bucket_string("ipc_mode"),
            network_mode: self.bucket_string("network_mode"),
            devices: self.bucket_strings("devices"),
            privileged: self.bucket_bool("privileged"),
            read_only: self.bucket_bool("read_only"),
            shm_size: self.bucket_string("shm_size"),
            volumes_from: self.bucket_strings("volumes_from"),
            extra_hosts: self.bucket_strings("extra_hosts"),
            group_add: self.bucket_strings("group_add"),
            cap_add: self.bucket_strings("cap_add"),
            cap_drop: self.bucket_strings("cap_drop"),
            restart_policy: self.bucket_string("restart_policy"),
            security_opt: self.bucket_strings("security_opt"),
        })
    }

    /// Render the equivalent `docker run` invocation.
    #[must_use]
    pub fn dump_run(&self, env: Environment, style: Style) -> String {
        let mut volumes = self.volumes.for_env(env);
        volumes.sort();
        let mut line = CommandLine::new("run")
            .flag("--detach", true)
            .list_all("--volume", volumes)
            .option("--env-file", self.env_file.clone());

        if let Some(entrypoint) = self.container.get("entrypoint") {
            let rendered = match entrypoint {
                Value::List(items) => items.first().map(Value::render).unwrap_or_default(),
                scalar => scalar.render(),
            };
            line = line.option("--entrypoint", rendered);
        }
        let singles: &[(&str, &str)] = &[
            ("hostname", "--hostname"),
            ("name", "--name"),
            ("user", "--user"),
            ("working_dir", "--workdir"),
            ("ipc_mode", "--ipc"),
            ("network_mode", "--network"),
            ("shm_size", "--shm-size"),
            ("domainname", "--domainname"),
            ("mac_address", "--mac-address"),
            ("stop_signal", "--stop-signal"),
            ("restart_policy", "--restart"),
        ];
        for (key, flag) in singles {
            if let Some(value) = self.bucket_string(key) {
                line = line.option(flag, value);
            }
        }

        let lists: &[(&str, &str)] = &[
            ("environment", "--env"),
            ("ports", "--publish"),
            ("labels", "--label"),
            ("dns", "--dns"),
            ("dns_search", "--dns-search"),
            ("links", "--link"),
            ("devices", "--device"),
            ("volumes_from", "--volumes-from"),
            ("extra_hosts", "--add-host"),
            ("group_add", "--group-add"),
            ("cap_add", "--cap-add"),
            ("cap_drop", "--cap-drop"),
            ("security_opt", "--security-opt"),
        ];
        for (key, flag) in lists {
            line = line.list_all(flag, self.bucket_strings(key));
        }

        let flags: &[(&str, &str)] = &[
            ("stdin_open", "--interactive"),
            ("tty", "--tty"),
            ("privileged", "--privileged"),
            ("read_only", "--read-only"),
        ];
        for (key, flag) in flags {
            line = line.flag(flag, self.bucket_bool(key));
        }

        line = line.positional(self.image.clone());
        if let Some(command) = self.container.get("command") {
            for part in command.as_strings() {
                line = line.positional(part);
            }
        }
        line.render(style)
    }

    /// Render the equivalent `docker build` invocation.
    #[must_use]
    pub fn dump_build(&self, env: Environment, opts: &BuildDump, style: Style) -> String {
        let dockerfile = self.dockerfile.get(env);
        let context = Path::new(dockerfile)
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        CommandLine::new("build")
            .option("--tag", self.image.clone())
            .option("--file", dockerfile)
            .flag("--pull", opts.pull)
            .flag("--rm", opts.rm)
            .flag("--force-rm", opts.force_rm)
            .flag("--no-cache", !opts.cache)
            .positional(context)
            .render(style)
    }
}

/// Resolve the dev/prod source descriptors for a unit.
///
/// An explicit `dockerfile` field wins: a scalar covers both
/// environments, a map carries `dev`/`prod` entries, and an empty string
/// turns building off. Otherwise the unit's directory is probed for a
/// `Dockerfile` (used for both) before a `Dockerfile.dev` +
/// `Dockerfile.prod` pair.
fn discover_dockerfile(field: Option<&Value>, source: &Path) -> EnvPair {
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let resolve = |p: &str| -> String {
        if p.is_empty() {
            String::new()
        } else {
            dir.join(p).display().to_string()
        }
    };
    match field {
        Some(Value::Map(entries)) => EnvPair {
            dev: resolve(&entries.get("dev").map(Value::render).unwrap_or_default()),
            prod: resolve(&entries.get("prod").map(Value::render).unwrap_or_default()),
        },
        Some(scalar) => {
            let rendered = scalar.render();
            EnvPair {
                dev: resolve(&rendered),
                prod: resolve(&rendered),
            }
        }
        None => {
            let plain = dir.join("Dockerfile");
            let dev = dir.join("Dockerfile.dev");
            let prod = dir.join("Dockerfile.prod");
            if plain.is_file() {
                EnvPair {
                    dev: plain.display().to_string(),
                    prod: plain.display().to_string(),
                }
            } else if dev.is_file() && prod.is_file() {
                EnvPair {
                    dev: dev.display().to_string(),
                    prod: prod.display().to_string(),
                }
            } else {
                EnvPair::default()
            }
        }
    }
}
