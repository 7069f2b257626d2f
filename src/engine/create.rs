//! Container creation.
//!
//! [`CreateSpec`] is the fully resolved payload a service produces for
//! the engine: the three option buckets flattened into one typed record,
//! volumes already split into container-side paths and host binds, and
//! environment merged from the env file and explicit entries.
//! [`CreateCommand`] turns that record into a `docker create`
//! invocation.

use super::EngineCommand;
use indexmap::IndexMap;

/// Resolved create-time payload for one container.
#[derive(Debug, Clone, Default)]
pub struct CreateSpec {
    /// Image reference to instantiate.
    pub image: String,
    /// Container name.
    pub name: String,
    /// Hostname inside the container.
    pub hostname: Option<String>,
    /// Entrypoint binary.
    pub entrypoint: Option<String>,
    /// Command arguments.
    pub command: Vec<String>,
    /// Environment, env-file values already folded in.
    pub environment: IndexMap<String, String>,
    /// Publish specs (`host:container` or bare container port).
    pub ports: Vec<String>,
    /// Container-side mount paths (anonymous or named volumes).
    pub volumes: Vec<String>,
    /// Host binds (`host_or_named:container[:mode]`).
    pub binds: Vec<String>,
    /// Keep stdin open.
    pub stdin_open: bool,
    /// Allocate a pseudo-tty.
    pub tty: bool,
    /// User spec (`uid[:gid]` or name).
    pub user: Option<String>,
    /// Working directory.
    pub working_dir: Option<String>,
    /// Labels as `key=value`.
    pub labels: Vec<String>,
    /// NIS domain name.
    pub domainname: Option<String>,
    /// MAC address.
    pub mac_address: Option<String>,
    /// Stop signal override.
    pub stop_signal: Option<String>,
    /// Disable networking entirely.
    pub network_disabled: bool,
    /// DNS servers.
    pub dns: Vec<String>,
    /// DNS search domains.
    pub dns_search: Vec<String>,
    /// Container links.
    pub links: Vec<String>,
    /// IPC namespace mode.
    pub ipc_mode: Option<String>,
    /// Network mode.
    pub network_mode: Option<String>,
    /// Device mappings.
    pub devices: Vec<String>,
    /// Privileged mode.
    pub privileged: bool,
    /// Read-only root filesystem.
    pub read_only: bool,
    /// Shared memory size.
    pub shm_size: Option<String>,
    /// Mount volumes from these containers.
    pub volumes_from: Vec<String>,
    /// Extra /etc/hosts entries.
    pub extra_hosts: Vec<String>,
    /// Additional groups.
    pub group_add: Vec<String>,
    /// Added capabilities.
    pub cap_add: Vec<String>,
    /// Dropped capabilities.
    pub cap_drop: Vec<String>,
    /// Restart policy.
    pub restart_policy: Option<String>,
    /// Security options.
    pub security_opt: Vec<String>,
}

/// `docker create` for a resolved spec.
#[derive(Debug, Clone)]
pub struct CreateCommand {
    spec: CreateSpec,
}

impl CreateCommand {
    /// Wrap a resolved spec.
    #[must_use]
    pub fn new(spec: CreateSpec) -> CreateCommand {
        CreateCommand { spec }
    }

    /// The wrapped spec.
    #[must_use]
    pub fn spec(&self) -> &CreateSpec {
        &self.spec
    }
}

impl EngineCommand for CreateCommand {
    fn subcommand(&self) -> &'static str {
        "create"
    }

    fn build_args(&self) -> Vec<String> {
        let spec = &self.spec;
        let mut args = Vec::new();
        let mut option = |flag: &str, value: &Option<String>| {
            if let Some(value) = value {
                if !value.is_empty() {
                    args.push(flag.to_string());
                    args.push(value.clone());
                }
            }
        };
        option("--name", &Some(spec.name.clone()));
        option("--hostname", &spec.hostname);
        option("--entrypoint", &spec.entrypoint);
        option("--user", &spec.user);
        option("--workdir", &spec.working_dir);
        option("--domainname", &spec.domainname);
        option("--mac-address", &spec.mac_address);
        option("--stop-signal", &spec.stop_signal);
        option("--ipc", &spec.ipc_mode);
        option("--shm-size", &spec.shm_size);
        option("--restart", &spec.restart_policy);
        if spec.network_disabled {
            option("--network", &Some("none".to_string()));
        } else {
            option("--network", &spec.network_mode);
        }

        let mut list = |flag: &str, values: &[String]| {
            for value in values {
                if !value.is_empty() {
                    args.push(flag.to_string());
                    args.push(value.clone());
                }
            }
        };
        list(
            "--env",
            &spec
                .environment
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>(),
        );
        list("--publish", &spec.ports);
        list("--volume", &spec.volumes);
        list("--volume", &spec.binds);
        list("--label", &spec.labels);
        list("--dns", &spec.dns);
        list("--dns-search", &spec.dns_search);
        list("--link", &spec.links);
        list("--device", &spec.devices);
        list("--volumes-from", &spec.volumes_from);
        list("--add-host", &spec.extra_hosts);
        list("--group-add", &spec.group_add);
        list("--cap-add", &spec.cap_add);
        list("--cap-drop", &spec.cap_drop);
        list("--security-opt", &spec.security_opt);

        if spec.stdin_open {
            args.push("--interactive".to_string());
        }
        if spec.tty {
            args.push("--tty".to_string());
        }
        if spec.privileged {
            args.push("--privileged".to_string());
        }
        if spec.read_only {
            args.push("--read-only".to_string());
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_full_create_invocation() {
        let spec = CreateSpec {
            image: "busybox:latest".into(),
            name: "example".into(),
            hostname: Some("example".into()),
            volumes: vec!["/var/cache".into()],
            binds: vec!["namevolume:/var/log".into()],
            dns_search: vec!["example".into()],
            stdin_open: true,
            tty: true,
            command: vec!["sleep".into(), "infinity".into()],
            ..CreateSpec::default()
        };
        let args = CreateCommand::new(spec).command_args();
        assert_eq!(args[0], "create");
        let joined = args.join(" ");
        assert!(joined.contains("--name example"));
        assert!(joined.contains("--hostname example"));
        assert!(joined.contains("--volume /var/cache"));
        assert!(joined.contains("--volume namevolume:/var/log"));
        assert!(joined.contains("--dns-search example"));
        assert!(joined.contains("--interactive"));
        assert!(joined.contains("--tty"));
        assert!(joined.ends_with("busybox:latest sleep infinity"));
    }

    #[test]
    fn image_comes_after_every_flag() {
        let spec = CreateSpec {
            image: "app:dev".into(),
            name: "app".into(),
            environment: [("A".to_string(), "1".to_string())].into_iter().collect(),
            ..CreateSpec::default()
        };
        let args = CreateCommand::new(spec).command_args();
        let image_at = args.iter().position(|a| a == "app:dev").unwrap();
        assert_eq!(image_at, args.len() - 1);
    }

    #[test]
    fn network_disabled_forces_network_none() {
        let spec = CreateSpec {
            image: "app:dev".into(),
            name: "app".into(),
            network_disabled: true,
            network_mode: Some("bridge".into()),
            ..CreateSpec::default()
        };
        let args = CreateCommand::new(spec).command_args();
        let at = args.iter().position(|a| a == "--network").unwrap();
        assert_eq!(args[at + 1], "none");
    }
}
