//! Recursive descriptor resolution.
//!
//! The resolver walks the root descriptor, follows `controlfile`
//! redirects (relative to the file they appear in), distinguishes group
//! descriptors from unit descriptors, folds option layers together as
//! it descends, and scopes `vars` blocks to their subtree. Units that
//! fail inside a group are logged and skipped so one bad service does
//! not take the project down; a bad root is fatal.

use crate::errors::{Error, Result};
use crate::project::service::Service;
use crate::project::{Group, Resolved};
use crate::substitute::{self, VarMap};
use crate::transform::{self, Op, Options};
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Caller-controlled knobs for resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveSettings {
    /// Inject `options.user.replace = "{UID}:{GID}"` at the root.
    pub as_me: bool,
    /// Extra variables overlaid on the ambient set.
    pub extra_vars: VarMap,
}

/// A fully resolved project: the flat service registry.
#[derive(Debug)]
pub struct Project {
    /// Registry of units and groups, `required` and `optional`
    /// included.
    pub services: IndexMap<String, Resolved>,
    /// The root descriptor path.
    pub root: PathBuf,
}

impl Project {
    /// Read and resolve a project file.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidDescriptor`] when the root descriptor is
    /// missing, unparseable, empty, or a single-unit document whose
    /// name cannot be derived.
    pub fn load(path: &Path, settings: &ResolveSettings) -> Result<Project> {
        let mut vars = substitute::ambient(path);
        for (name, value) in &settings.extra_vars {
            vars.insert(name.clone(), value.clone());
        }

        let mut data = read_descriptor(path)?;
        if data.as_map().is_some_and(|m| !m.contains_key("services")) {
            data = wrap_single_unit(data, path)?;
        }

        let mut root_options = Options::new();
        if settings.as_me {
            let mut ops = transform::OpSet::new();
            ops.insert(Op::Replace, Value::str("{UID}:{GID}"));
            root_options.insert("user".to_string(), ops);
        }

        let mut resolver = Resolver {
            registry: IndexMap::new(),
            required: Vec::new(),
            optional: Vec::new(),
            active: vec![path.to_path_buf()],
        };
        resolver.resolve(&data, None, &root_options, &vars, path)?;

        let mut services = resolver.registry;
        services.insert(
            "required".to_string(),
            Resolved::Group(Group {
                name: "required".to_string(),
                members: resolver.required,
                source: path.to_path_buf(),
            }),
        );
        services.insert(
            "optional".to_string(),
            Resolved::Group(Group {
                name: "optional".to_string(),
                members: resolver.optional,
                source: path.to_path_buf(),
            }),
        );
        Ok(Project {
            services,
            root: path.to_path_buf(),
        })
    }

    /// The unit service with this name, when present.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&Service> {
        self.services.get(name).and_then(Resolved::as_unit)
    }

    /// Expand a selection of names into unit services. Groups flatten
    /// (recursively, for late-bound name lists); an empty selection
    /// means the `required` group.
    ///
    /// # Errors
    ///
    /// [`Error::PreFlightMissing`] for a name the registry does not
    /// contain.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Service>> {
        let names: Vec<String> = if names.is_empty() {
            vec!["required".to_string()]
        } else {
            names.to_vec()
        };
        let mut seen = Vec::new();
        let mut units = Vec::new();
        let mut queue: Vec<String> = names;
        while !queue.is_empty() {
            let name = queue.remove(0);
            if seen.contains(&name) {
                continue;
            }
            seen.push(name.clone());
            match self.services.get(&name) {
                Some(Resolved::Unit(service)) => units.push(service.as_ref()),
                Some(Resolved::Group(group)) => {
                    queue.extend(group.members.iter().cloned());
                }
                None => {
                    return Err(Error::PreFlightMissing {
                        message: format!("no service named {name}"),
                    })
                }
            }
        }
        Ok(units)
    }
}

struct Resolver {
    registry: IndexMap<String, Resolved>,
    required: Vec<String>,
    optional: Vec<String>,
    active: Vec<PathBuf>,
}

impl Resolver {
    /// Resolve one node of the descriptor tree. Returns the names of
    /// the unit services discovered underneath it.
    fn resolve(
        &mut self,
        data: &Value,
        name: Option<&str>,
        options: &Options,
        vars: &VarMap,
        source: &Path,
    ) -> Result<Vec<String>> {
        // Follow a redirect to another descriptor file.
        if let Some(target) = data.as_map().and_then(|m| m.get("controlfile")) {
            let dir = source.parent().unwrap_or_else(|| Path::new("."));
            let target = dir.join(target.render());
            if self.active.contains(&target) {
                return Err(Error::InvalidDescriptor {
                    path: target,
                    reason: "descriptor includes itself".to_string(),
                });
            }
            let loaded = read_descriptor(&target)?;
            self.active.push(target.clone());
            let result = self.resolve(&loaded, name, options, vars, &target);
            self.active.pop();
            return result;
        }

        match data.as_map().and_then(|m| m.get("services")) {
            Some(Value::Map(children)) => {
                let children = children.clone();
                let map = data.as_map().cloned().unwrap_or_default();
                self.resolve_group(&map, name, &children, options, vars, source)
            }
            Some(Value::List(members)) => {
                // A pure group: late-bound member names that must be
                // discovered elsewhere in the traversal.
                let members: Vec<String> = members.iter().map(Value::render).collect();
                if let Some(name) = name {
                    self.registry.insert(
                        name.to_string(),
                        Resolved::Group(Group {
                            name: name.to_string(),
                            members,
                            source: source.to_path_buf(),
                        }),
                    );
                }
                Ok(Vec::new())
            }
            Some(other) => Err(Error::InvalidDescriptor {
                path: source.to_path_buf(),
                reason: format!("services must be a map or a list, not {:?}", other.kind()),
            }),
            None => self.resolve_unit(data, name, options, vars, source),
        }
    }

    fn resolve_group(
        &mut self,
        map: &IndexMap<String, Value>,
        name: Option<&str>,
        children: &IndexMap<String, Value>,
        options: &Options,
        vars: &VarMap,
        source: &Path,
    ) -> Result<Vec<String>> {
        let own_options = transform::parse_options(map.get("options"));
        let merged = transform::merge_options(options, &own_options);
        let mut scope = vars.clone();
        substitute::extend(&mut scope, map.get("vars"));

        let mut members = Vec::new();
        for (child_name, child_data) in children {
            match self.resolve(child_data, Some(child_name), &merged, &scope, source) {
                Ok(names) => members.extend(names),
                Err(err @ Error::InvalidDescriptor { .. }) => {
                    warn!(service = %child_name, error = %err, "skipping invalid service");
                }
                Err(other) => return Err(other),
            }
        }
        if let Some(name) = name {
            self.registry.insert(
                name.to_string(),
                Resolved::Group(Group {
                    name: name.to_string(),
                    members: members.clone(),
                    source: source.to_path_buf(),
                }),
            );
        }
        Ok(members)
    }

    fn resolve_unit(
        &mut self,
        data: &Value,
        name: Option<&str>,
        options: &Options,
        vars: &VarMap,
        source: &Path,
    ) -> Result<Vec<String>> {
        // The registry key from the enclosing map seeds the service
        // name unless the unit names itself.
        let mut data = data.clone();
        if let (Some(name), Value::Map(map)) = (name, &mut data) {
            if !map.contains_key("service") {
                map.insert("service".to_string(), Value::str(name));
            }
        }

        let mut service = Service::from_descriptor(&data, source)?;
        for (key, ops) in options {
            if !service.recognizes(key) {
                debug!(key = %key, "skipping transform for unrecognized key");
                continue;
            }
            for op in Op::APPLICATION_ORDER {
                if let Some(operand) = ops.get(&op) {
                    let current = service.current(key);
                    let applied = transform::apply(op, current.as_ref(), operand);
                    service.set(key, applied)?;
                }
            }
        }
        service.substitute_all(vars);

        if service.name.is_empty() {
            return Err(Error::InvalidDescriptor {
                path: source.to_path_buf(),
                reason: "unable to derive a service name".to_string(),
            });
        }
        let registered = service.name.clone();
        if service.required {
            self.required.push(registered.clone());
        } else {
            self.optional.push(registered.clone());
        }
        if self
            .registry
            .insert(registered.clone(), Resolved::Unit(Box::new(service)))
            .is_some()
        {
            warn!(service = %registered, "duplicate service name; the later definition wins");
        }
        Ok(vec![registered])
    }
}

fn read_descriptor(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::InvalidDescriptor {
        path: path.to_path_buf(),
        reason: format!("cannot read descriptor: {e}"),
    })?;
    let json: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| Error::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: format!("not valid JSON: {e}"),
        })?;
    let value = Value::from(json);
    match &value {
        Value::Map(entries) if !entries.is_empty() => Ok(value),
        Value::Map(_) => Err(Error::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: "empty descriptor".to_string(),
        }),
        _ => Err(Error::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: "descriptor must be a JSON object".to_string(),
        }),
    }
}

/// Wrap a document with no `services` key as a single-unit project,
/// guessing the unit's name.
fn wrap_single_unit(data: Value, path: &Path) -> Result<Value> {
    let empty = IndexMap::new();
    let map = data.as_map().unwrap_or(&empty);
    let container = map.get("container").and_then(Value::as_map);
    let name = map
        .get("service")
        .map(Value::render)
        .or_else(|| container.and_then(|c| c.get("name")).map(Value::render))
        .or_else(|| container.and_then(|c| c.get("hostname")).map(Value::render))
        .or_else(|| {
            map.get("image")
                .map(|image| crate::reference::ImageRef::parse(&image.render()).image)
        })
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::InvalidDescriptor {
            path: path.to_path_buf(),
            reason: "unable to derive a service name".to_string(),
        })?;
    let mut services = IndexMap::new();
    services.insert(name, data);
    let mut wrapper = IndexMap::new();
    wrapper.insert("services".to_string(), Value::Map(services));
    Ok(Value::Map(wrapper))
}
