//! The command-line surface.
//!
//! A verb, zero or more service names, and flags. The verb is a free
//! word: anything that is not a built-in handler is looked up in each
//! service's command table, so the parser cannot enumerate verbs up
//! front.

use clap::Parser;
use std::path::PathBuf;

/// Control the building and running of container services.
#[derive(Debug, Parser)]
#[command(name = "stevedore", version, about)]
pub struct Invocation {
    /// Verb to run (build, build-prod, start, stop, restart, open, or a
    /// command defined by a service). Defaults to build + restart.
    #[arg(default_value = "default")]
    pub verb: String,

    /// Services to operate on; all required services when omitted.
    pub services: Vec<String>,

    /// Print debug diagnostics.
    #[arg(short, long)]
    pub debug: bool,

    /// Be forceful: kill instead of stop, force-remove build layers.
    #[arg(short, long)]
    pub force: bool,

    /// Perform no engine mutations.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Override the image of a single selected service.
    #[arg(short, long)]
    pub image: Option<String>,

    /// Override the container name of a single selected service.
    #[arg(long)]
    pub name: Option<String>,

    /// Override the source descriptor of a single selected service.
    #[arg(long)]
    pub dockerfile: Option<String>,

    /// Use the build cache.
    #[arg(long = "cache", overrides_with = "no_cache")]
    cache: bool,

    /// Do not use the build cache.
    #[arg(long = "no-cache", overrides_with = "cache")]
    no_cache: bool,

    /// Pull newer base images from the registry.
    #[arg(long = "pull", overrides_with = "no_pull")]
    pull: bool,

    /// Do not pull newer base images.
    #[arg(long = "no-pull", overrides_with = "pull")]
    no_pull: bool,

    /// Suppress every volume bind while starting.
    #[arg(long)]
    pub no_volumes: bool,

    /// Do not remove intermediate build layers.
    #[arg(long)]
    pub no_rm: bool,

    /// Skip registry TLS verification.
    #[arg(long)]
    pub no_verify: bool,

    /// Remove volumes after stopping. THIS IS EXTREMELY DANGEROUS.
    #[arg(long)]
    pub wipe: bool,

    /// Take down a running container for the duration of a custom
    /// command.
    #[arg(long)]
    pub replace: bool,

    /// Project descriptor location.
    #[arg(long, default_value = "Controlfile")]
    pub controlfile: PathBuf,

    /// Print the equivalent engine command line instead of executing.
    #[arg(long)]
    pub dump: bool,

    /// Run containers as the invoking user (uid:gid).
    #[arg(long)]
    pub as_me: bool,
}

impl Invocation {
    /// The tri-valued pull policy: `Some(true)` for `--pull`,
    /// `Some(false)` for `--no-pull`, `None` when unset.
    #[must_use]
    pub fn pull(&self) -> Option<bool> {
        if self.no_pull {
            Some(false)
        } else if self.pull {
            Some(true)
        } else {
            None
        }
    }

    /// The tri-valued cache policy; the default depends on the verb.
    #[must_use]
    pub fn cache(&self) -> Option<bool> {
        if self.no_cache {
            Some(false)
        } else if self.cache {
            Some(true)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_and_services_are_positional() {
        let inv = Invocation::parse_from(["stevedore", "build", "api", "worker"]);
        assert_eq!(inv.verb, "build");
        assert_eq!(inv.services, vec!["api", "worker"]);
    }

    #[test]
    fn defaults_are_tri_valued() {
        let inv = Invocation::parse_from(["stevedore"]);
        assert_eq!(inv.verb, "default");
        assert_eq!(inv.pull(), None);
        assert_eq!(inv.cache(), None);
    }

    #[test]
    fn later_pull_flag_wins() {
        let inv = Invocation::parse_from(["stevedore", "build", "--pull", "--no-pull"]);
        assert_eq!(inv.pull(), Some(false));
        let inv = Invocation::parse_from(["stevedore", "build", "--no-pull", "--pull"]);
        assert_eq!(inv.pull(), Some(true));
    }

    #[test]
    fn custom_verbs_pass_through() {
        let inv = Invocation::parse_from(["stevedore", "migrate", "api", "--replace"]);
        assert_eq!(inv.verb, "migrate");
        assert!(inv.replace);
    }
}
