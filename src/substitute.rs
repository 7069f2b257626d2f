//! Variable substitution over descriptor values.
//!
//! Group descriptors can declare `vars` blocks, and a handful of ambient
//! variables are always in scope (project paths, a per-invocation
//! session id, the caller's uid/gid, the hostname, and the VCS tuple
//! when the descriptor lives in a git work tree). Every string leaf of a
//! resolved service gets `{NAME}` tokens interpolated.
//!
//! A leaf that references a name not in scope is left untouched. Deeper
//! resolution stages (or the engine itself) may know more than we do, so
//! a partial configuration survives instead of failing early.

use crate::value::Value;
use indexmap::IndexMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;
use uuid::Uuid;

/// A set of in-scope variables.
pub type VarMap = IndexMap<String, String>;

/// Interpolate `{NAME}` tokens in one string.
///
/// Returns `None` when the string references a variable that is not in
/// scope or the brace structure is malformed; callers keep the original
/// leaf in that case. `{{` and `}}` are literal braces.
#[must_use]
pub fn interpolate(input: &str, vars: &VarMap) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return None,
                    }
                }
                out.push_str(vars.get(&name)?);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    out.push('}');
                } else {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Walk a value tree, substituting every string leaf. Structure is
/// preserved; leaves with unresolved tokens pass through unchanged.
#[must_use]
pub fn substitute(value: &Value, vars: &VarMap) -> Value {
    match value {
        Value::Str(s) => match interpolate(s, vars) {
            Some(replaced) => Value::Str(replaced),
            None => {
                debug!(leaf = %s, "leaving leaf with unresolved variables");
                value.clone()
            }
        },
        Value::List(items) => Value::List(items.iter().map(|v| substitute(v, vars)).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v, vars)))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

/// Extend a variable scope with a descriptor `vars` block. The block's
/// own values are substituted against the scope as it stood, so nested
/// groups can build on their ancestors' variables.
pub fn extend(scope: &mut VarMap, block: Option<&Value>) {
    let Some(Value::Map(entries)) = block else {
        return;
    };
    for (name, value) in entries {
        let rendered = match value {
            Value::Str(s) => interpolate(s, scope).unwrap_or_else(|| s.clone()),
            other => other.render(),
        };
        scope.insert(name.clone(), rendered);
    }
}

/// The ambient variables available to every descriptor, before any
/// `vars` blocks apply. Process environment is overlaid last so the
/// caller's shell always wins.
#[must_use]
pub fn ambient(root_descriptor: &Path) -> VarMap {
    let mut vars = VarMap::new();

    let dir = root_descriptor
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
    let dir = dir.canonicalize().unwrap_or(dir);
    vars.insert("PROJECT_DIR".into(), dir.display().to_string());
    if let Some(parent) = dir.parent() {
        vars.insert("PROJECT_PATH".into(), parent.display().to_string());
    }
    vars.insert("SESSION_UUID".into(), Uuid::new_v4().to_string());
    vars.insert("UID".into(), current_uid());
    vars.insert("GID".into(), current_gid());
    vars.insert("HOSTNAME".into(), hostname());

    for (name, value) in vcs_vars(&dir) {
        vars.insert(name, value);
    }
    for (name, value) in std::env::vars() {
        vars.insert(name, value);
    }
    vars
}

#[cfg(unix)]
fn current_uid() -> String {
    rustix::process::getuid().as_raw().to_string()
}

#[cfg(unix)]
fn current_gid() -> String {
    rustix::process::getgid().as_raw().to_string()
}

#[cfg(unix)]
fn hostname() -> String {
    rustix::system::uname()
        .nodename()
        .to_string_lossy()
        .into_owned()
}

#[cfg(not(unix))]
fn current_uid() -> String {
    "0".into()
}

#[cfg(not(unix))]
fn current_gid() -> String {
    "0".into()
}

#[cfg(not(unix))]
fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_default()
}

/// The VCS tuple when the descriptor directory is inside a git work
/// tree; empty otherwise. Failures are quiet: not every project is
/// version controlled.
fn vcs_vars(dir: &Path) -> Vec<(String, String)> {
    let git = |args: &[&str]| -> Option<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!text.is_empty()).then_some(text)
    };

    let Some(root) = git(&["rev-parse", "--show-toplevel"]) else {
        return Vec::new();
    };
    let Some(commit) = git(&["rev-parse", "HEAD"]) else {
        return Vec::new();
    };
    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
    let short = commit.chars().take(7).collect::<String>();
    vec![
        ("VCS_ROOT".into(), root),
        ("VCS_BRANCH".into(), branch),
        ("VCS_COMMIT".into(), commit),
        ("VCS_SHORT_COMMIT".into(), short),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(entries: &[(&str, &str)]) -> VarMap {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn interpolates_known_names() {
        let scope = vars(&[("FOO", "example"), ("BAR", "two")]);
        assert_eq!(
            interpolate("{FOO}:/var/{BAR}", &scope),
            Some("example:/var/two".to_string())
        );
    }

    #[test]
    fn missing_name_leaves_leaf_unchanged() {
        let scope = vars(&[("FOO", "example")]);
        assert_eq!(interpolate("{MISSING}/x", &scope), None);
        let leaf = Value::str("{MISSING}/x");
        assert_eq!(substitute(&leaf, &scope), leaf);
    }

    #[test]
    fn double_braces_are_literal() {
        let scope = VarMap::new();
        assert_eq!(
            interpolate("{{literal}} text", &scope),
            Some("{literal} text".to_string())
        );
    }

    #[test]
    fn substitution_preserves_structure() {
        let scope = vars(&[("FOO", "example")]);
        let tree = Value::Map(
            [
                (
                    "volumes".to_string(),
                    Value::str_list(&["vardata:/var/lib/{FOO}"]),
                ),
                ("count".to_string(), Value::Num(3.into())),
            ]
            .into_iter()
            .collect(),
        );
        let substituted = substitute(&tree, &scope);
        let map = substituted.as_map().unwrap();
        assert_eq!(
            map["volumes"],
            Value::str_list(&["vardata:/var/lib/example"])
        );
        assert_eq!(map["count"], Value::Num(3.into()));
    }

    #[test]
    fn extend_substitutes_block_values_against_current_scope() {
        let mut scope = vars(&[("BASE", "corp")]);
        let block = Value::Map(
            [
                ("DOMAIN".to_string(), Value::str("{BASE}.example")),
                ("PORT".to_string(), Value::Num(5000.into())),
            ]
            .into_iter()
            .collect(),
        );
        extend(&mut scope, Some(&block));
        assert_eq!(scope["DOMAIN"], "corp.example");
        assert_eq!(scope["PORT"], "5000");
    }

    #[test]
    fn ambient_includes_the_session_identity() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = dir.path().join("Controlfile");
        std::fs::write(&descriptor, "{}").unwrap();
        let scope = ambient(&descriptor);
        assert!(scope.contains_key("PROJECT_DIR"));
        assert!(scope.contains_key("PROJECT_PATH"));
        assert!(scope.contains_key("SESSION_UUID"));
        assert!(scope.contains_key("UID"));
        assert!(scope.contains_key("GID"));
        assert!(scope.contains_key("HOSTNAME"));
    }
}
