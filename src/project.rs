//! Project descriptor resolution.
//!
//! A project file declares services, either directly (a single-unit
//! descriptor) or as a tree of groups whose leaves may live in included
//! files. Resolution flattens that tree into a registry of unit
//! services plus the groups that aggregate them, with every option
//! transform applied and every variable substituted. The registry is
//! frozen once resolution finishes; the dispatcher never writes back.

pub mod resolver;
pub mod service;

pub use resolver::{Project, ResolveSettings};
pub use service::{
    split_volumes, BuildDump, EnvPair, Environment, Service, VolumeSet,
};

use std::path::PathBuf;

/// A named aggregate of unit services.
#[derive(Debug, Clone)]
pub struct Group {
    /// Registry key.
    pub name: String,
    /// Member service names, in discovery order.
    pub members: Vec<String>,
    /// Descriptor file the group was declared in.
    pub source: PathBuf,
}

/// One registry entry: a unit service or a group.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// A leaf service.
    Unit(Box<Service>),
    /// A named aggregate.
    Group(Group),
}

impl Resolved {
    /// The unit service, when this entry is one.
    #[must_use]
    pub fn as_unit(&self) -> Option<&Service> {
        match self {
            Resolved::Unit(service) => Some(service),
            Resolved::Group(_) => None,
        }
    }
}
