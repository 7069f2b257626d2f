//! The option transform algebra.
//!
//! Group descriptors modify their descendants through four operations —
//! `prefix`, `suffix`, `union`, and `replace` — applied to option keys.
//! Every operation is defined over the full scalar/list/map kind grid:
//! when operand kinds differ the result takes the more structured kind,
//! scalars and lists promote into maps under the distinguished `shared`
//! key, and maps combine pointwise over the union of their key sets.
//!
//! Two consumers drive this module: [`merge_options`] folds an outer
//! option layer over an inner one while preserving "inner happens first"
//! semantics, and [`apply`] applies a merged operation to a service's
//! current value.

use crate::value::Value;
use indexmap::IndexMap;

/// The key under which scalar and list operands are promoted when they
/// meet a map operand.
pub const SHARED_KEY: &str = "shared";

/// One of the four transform operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Prepend the operand.
    Prefix,
    /// Append the operand.
    Suffix,
    /// Ordered set-union with the operand.
    Union,
    /// Replace with the operand when it is truthy.
    Replace,
}

impl Op {
    /// All operations, in the order they are applied to a service when a
    /// single key carries several of them.
    pub const APPLICATION_ORDER: [Op; 4] = [Op::Replace, Op::Prefix, Op::Suffix, Op::Union];

    /// Parse a descriptor operation name. Unknown names are ignored by
    /// callers rather than rejected, so this returns an `Option`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Op> {
        match name {
            "prefix" => Some(Op::Prefix),
            "suffix" => Some(Op::Suffix),
            "union" => Some(Op::Union),
            "replace" => Some(Op::Replace),
            _ => None,
        }
    }

    /// The descriptor spelling of this operation.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Op::Prefix => "prefix",
            Op::Suffix => "suffix",
            Op::Union => "union",
            Op::Replace => "replace",
        }
    }
}

/// The operations attached to a single option key.
pub type OpSet = IndexMap<Op, Value>;

/// A full options layer: option key to operation set.
pub type Options = IndexMap<String, OpSet>;

/// Read an `options` block out of a descriptor value. Unrecognized
/// operation names are dropped silently; a Controlfile author cannot
/// smuggle arbitrary behaviour through an option key.
#[must_use]
pub fn parse_options(value: Option<&Value>) -> Options {
    let mut options = Options::new();
    let Some(Value::Map(keys)) = value else {
        return options;
    };
    for (key, ops) in keys {
        let mut set = OpSet::new();
        if let Value::Map(entries) = ops {
            for (name, operand) in entries {
                if let Some(op) = Op::parse(name) {
                    set.insert(op, operand.clone());
                }
            }
        }
        options.insert(key.clone(), set);
    }
    options
}

/// Combine two operands under an operation. `left` carries the inner
/// (first-applied) side, `right` the outer side.
#[must_use]
pub fn combine(op: Op, left: &Value, right: &Value) -> Value {
    match op {
        Op::Replace => replace(Some(left), Some(right)),
        Op::Suffix => suffix(left, right),
        Op::Prefix => prefix(left, right),
        Op::Union => union(left, right),
    }
}

fn replace(left: Option<&Value>, right: Option<&Value>) -> Value {
    if let (Some(Value::Map(l)), Some(Value::Map(r))) = (left, right) {
        let mut merged = IndexMap::new();
        for key in l.keys().chain(r.keys().filter(|k| !l.contains_key(*k))) {
            merged.insert(key.clone(), replace(l.get(key), r.get(key)));
        }
        return Value::Map(merged);
    }
    match (left, right) {
        (_, Some(r)) if r.truthy() => r.clone(),
        (Some(l), _) => l.clone(),
        (None, Some(r)) => r.clone(),
        (None, None) => Value::Str(String::new()),
    }
}

fn suffix(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Map(l), Value::Map(r)) => map_cells(Op::Suffix, l, r),
        (Value::Map(l), _) => map_cells(Op::Suffix, l, &shared_wrap(right.clone())),
        (_, Value::Map(r)) => map_cells(Op::Suffix, &shared_wrap(left.clone()), r),
        (Value::List(l), Value::List(r)) => {
            Value::List(l.iter().chain(r.iter()).cloned().collect())
        }
        (Value::List(l), scalar) => {
            let mut items = l.clone();
            items.push(scalar.clone());
            Value::List(items)
        }
        (scalar, Value::List(r)) => {
            let mut items = vec![scalar.clone()];
            items.extend(r.iter().cloned());
            Value::List(items)
        }
        (l, r) => Value::Str(format!("{}{}", l.render(), r.render())),
    }
}

fn prefix(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Map(l), Value::Map(r)) => map_cells(Op::Prefix, l, r),
        (Value::Map(l), _) => map_cells(Op::Prefix, l, &shared_wrap(right.clone())),
        (_, Value::Map(r)) => map_cells(Op::Prefix, &shared_wrap(left.clone()), r),
        (Value::List(l), Value::List(r)) => {
            Value::List(r.iter().chain(l.iter()).cloned().collect())
        }
        (Value::List(l), scalar) => {
            let mut items = vec![scalar.clone()];
            items.extend(l.iter().cloned());
            Value::List(items)
        }
        (scalar, Value::List(r)) => {
            let mut items = r.clone();
            items.push(scalar.clone());
            Value::List(items)
        }
        (l, r) => Value::Str(format!("{}{}", r.render(), l.render())),
    }
}

fn union(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Map(l), Value::Map(r)) => map_cells(Op::Union, l, r),
        (Value::Map(l), Value::List(r)) => {
            if r.is_empty() {
                left.clone()
            } else {
                map_cells(Op::Union, l, &shared_wrap(right.clone()))
            }
        }
        (Value::Map(l), scalar) => {
            map_cells(Op::Union, l, &shared_wrap(Value::List(vec![scalar.clone()])))
        }
        (Value::List(l), Value::Map(r)) => {
            if l.is_empty() {
                right.clone()
            } else {
                map_cells(Op::Union, &shared_wrap(left.clone()), r)
            }
        }
        (scalar, Value::Map(r)) => {
            if scalar.truthy() {
                map_cells(
                    Op::Union,
                    &shared_wrap(Value::List(vec![scalar.clone()])),
                    r,
                )
            } else {
                // Nothing on the left: normalize the map's scalar leaves
                // into lists so union output is kind-stable.
                Value::Map(
                    r.iter()
                        .map(|(k, v)| (k.clone(), listify(v)))
                        .collect(),
                )
            }
        }
        (Value::List(l), Value::List(r)) => {
            let mut items = l.clone();
            for candidate in r {
                if !items.contains(candidate) {
                    items.push(candidate.clone());
                }
            }
            Value::List(items)
        }
        (Value::List(l), scalar) => {
            if l.contains(scalar) {
                left.clone()
            } else {
                let mut items = l.clone();
                items.push(scalar.clone());
                Value::List(items)
            }
        }
        (scalar, Value::List(r)) => {
            let mut items = vec![scalar.clone()];
            items.extend(r.iter().filter(|v| *v != scalar).cloned());
            Value::List(items)
        }
        (l, r) => {
            if l == r {
                if l.truthy() {
                    Value::List(vec![l.clone()])
                } else {
                    Value::List(Vec::new())
                }
            } else {
                Value::List([l, r].into_iter().filter(|v| v.truthy()).cloned().collect())
            }
        }
    }
}

fn listify(value: &Value) -> Value {
    match value {
        Value::List(_) => value.clone(),
        other => Value::List(vec![other.clone()]),
    }
}

fn shared_wrap(value: Value) -> IndexMap<String, Value> {
    let mut map = IndexMap::new();
    map.insert(SHARED_KEY.to_string(), value);
    map
}

/// Pointwise combination over the union of two maps' key sets. A key
/// missing on one side defaults to the empty value of the more
/// structured kind present for that key.
fn map_cells(op: Op, left: &IndexMap<String, Value>, right: &IndexMap<String, Value>) -> Value {
    let mut merged = IndexMap::new();
    for key in left
        .keys()
        .chain(right.keys().filter(|k| !left.contains_key(*k)))
    {
        let l = left.get(key);
        let r = right.get(key);
        let default = Value::empty_of(Value::kind_of(l).max(Value::kind_of(r)));
        merged.insert(
            key.clone(),
            combine(op, l.unwrap_or(&default), r.unwrap_or(&default)),
        );
    }
    Value::Map(merged)
}

/// Merge a nested option layer into the one wrapping it.
///
/// The result reflects "inner happens first, outer wraps it": a merged
/// suffix applied to a value yields `value + inner + outer`, a merged
/// prefix yields `outer + inner + value`, and a merged union reads the
/// inner entries before the outer ones. Operations combine per key and
/// per op; combinations that come out empty are dropped.
#[must_use]
pub fn merge_options(outer: &Options, inner: &Options) -> Options {
    let mut merged = Options::new();
    for key in outer
        .keys()
        .chain(inner.keys().filter(|k| !outer.contains_key(*k)))
    {
        let empty = OpSet::new();
        let outer_ops = outer.get(key).unwrap_or(&empty);
        let inner_ops = inner.get(key).unwrap_or(&empty);
        let mut set = OpSet::new();
        for op in Op::APPLICATION_ORDER {
            if !outer_ops.contains_key(&op) && !inner_ops.contains_key(&op) {
                continue;
            }
            let i = inner_ops.get(&op);
            let o = outer_ops.get(&op);
            let joined = if op == Op::Replace {
                replace(i, o)
            } else {
                let default = Value::empty_of(Value::kind_of(i).max(Value::kind_of(o)));
                combine(op, i.unwrap_or(&default), o.unwrap_or(&default))
            };
            if joined.truthy() {
                set.insert(op, joined);
            }
        }
        merged.insert(key.clone(), set);
    }
    merged
}

/// Apply a single merged operation to a service's current value.
///
/// `prefix`, `suffix`, and `replace` anchor on the current value (it is
/// the left operand). `union` reads the accumulated layer operand first,
/// so entries contributed by enclosing groups lead the result and the
/// service's own entries follow, deduplicated.
#[must_use]
pub fn apply(op: Op, current: Option<&Value>, operand: &Value) -> Value {
    let default = Value::empty_of(operand.kind());
    let current = current.unwrap_or(&default);
    match op {
        Op::Union => combine(Op::Union, operand, current),
        other => combine(other, current, operand),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    fn opset(entries: &[(Op, Value)]) -> OpSet {
        entries.iter().map(|(op, v)| (*op, v.clone())).collect()
    }

    fn options(entries: &[(&str, OpSet)]) -> Options {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn suffix_scalar_scalar_concatenates() {
        let merged = merge_options(
            &options(&[("name", opset(&[(Op::Suffix, Value::str(".outer"))]))]),
            &options(&[
                ("name", opset(&[(Op::Suffix, Value::str(".inner"))])),
                ("hostname", opset(&[(Op::Suffix, Value::str(".inner"))])),
            ]),
        );
        assert_eq!(merged["name"][&Op::Suffix], Value::str(".inner.outer"));
        assert_eq!(merged["hostname"][&Op::Suffix], Value::str(".inner"));
    }

    #[test]
    fn suffix_scalar_and_list_promote() {
        // inner list, outer scalar: scalar lands at the end
        assert_eq!(
            combine(Op::Suffix, &Value::str_list(&["one", "two"]), &Value::str("outer")),
            Value::str_list(&["one", "two", "outer"])
        );
        // inner scalar, outer list: scalar stays in front
        assert_eq!(
            combine(Op::Suffix, &Value::str("inner"), &Value::str_list(&["one", "two"])),
            Value::str_list(&["inner", "one", "two"])
        );
    }

    #[test]
    fn suffix_scalar_into_map_wraps_shared() {
        let inner = map(&[
            ("dev", Value::str("innerdev")),
            ("shared", Value::str("innershared")),
        ]);
        let combined = combine(Op::Suffix, &inner, &Value::str(".outer"));
        assert_eq!(
            combined,
            map(&[
                ("dev", Value::str("innerdev")),
                ("shared", Value::str("innershared.outer")),
            ])
        );
    }

    #[test]
    fn suffix_map_map_combines_per_key() {
        let outer = map(&[
            ("prod", Value::str(".outerprod")),
            ("shared", Value::str(".outer")),
        ]);
        let inner = map(&[
            ("dev", Value::str(".innerdev")),
            ("shared", Value::str(".inner")),
        ]);
        let combined = combine(Op::Suffix, &inner, &outer);
        assert_eq!(
            combined,
            map(&[
                ("dev", Value::str(".innerdev")),
                ("shared", Value::str(".inner.outer")),
                ("prod", Value::str(".outerprod")),
            ])
        );
    }

    #[test]
    fn prefix_mirrors_suffix() {
        assert_eq!(
            combine(Op::Prefix, &Value::str("inner."), &Value::str("outer.")),
            Value::str("outer.inner.")
        );
        assert_eq!(
            combine(Op::Prefix, &Value::str_list(&["inner"]), &Value::str_list(&["one", "two"])),
            Value::str_list(&["one", "two", "inner"])
        );
        let inner = map(&[
            ("dev", Value::str("innerdev.")),
            ("shared", Value::str("inner.")),
        ]);
        let outer = map(&[
            ("prod", Value::str("outerprod.")),
            ("shared", Value::str("outer.")),
        ]);
        assert_eq!(
            combine(Op::Prefix, &inner, &outer),
            map(&[
                ("dev", Value::str("innerdev.")),
                ("shared", Value::str("outer.inner.")),
                ("prod", Value::str("outerprod.")),
            ])
        );
    }

    #[test]
    fn union_deduplicates_preserving_first_occurrence() {
        assert_eq!(
            combine(
                Op::Union,
                &Value::str_list(&["one", "inner"]),
                &Value::str_list(&["one", "two"])
            ),
            Value::str_list(&["one", "inner", "two"])
        );
    }

    #[test]
    fn union_of_scalars_builds_a_list() {
        assert_eq!(
            combine(Op::Union, &Value::str("inner"), &Value::str("outer")),
            Value::str_list(&["inner", "outer"])
        );
        assert_eq!(
            combine(Op::Union, &Value::str("same"), &Value::str("same")),
            Value::str_list(&["same"])
        );
        assert_eq!(
            combine(Op::Union, &Value::str(""), &Value::str("outer")),
            Value::str_list(&["outer"])
        );
        assert_eq!(
            combine(Op::Union, &Value::str(""), &Value::str("")),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn union_scalar_into_map_promotes_to_lists() {
        let inner = map(&[
            ("dev", Value::str("innerdev")),
            ("shared", Value::str("innershared")),
        ]);
        assert_eq!(
            combine(Op::Union, &inner, &Value::str("outer")),
            map(&[
                ("dev", Value::str_list(&["innerdev"])),
                ("shared", Value::str_list(&["innershared", "outer"])),
            ])
        );
    }

    #[test]
    fn union_empty_list_operand_is_identity() {
        let m = map(&[("shared", Value::str_list(&["kept"]))]);
        assert_eq!(combine(Op::Union, &m, &Value::List(Vec::new())), m);
        assert_eq!(combine(Op::Union, &Value::List(Vec::new()), &m), m);
    }

    #[test]
    fn replace_prefers_truthy_right() {
        assert_eq!(
            combine(Op::Replace, &Value::str(".inner"), &Value::str(".outer")),
            Value::str(".outer")
        );
        assert_eq!(
            combine(Op::Replace, &Value::str(".inner"), &Value::str("")),
            Value::str(".inner")
        );
        assert_eq!(
            combine(Op::Replace, &Value::str_list(&["one", "two"]), &Value::str("outer")),
            Value::str("outer")
        );
    }

    #[test]
    fn replace_merges_maps_per_key() {
        let inner = map(&[
            ("dev", Value::str(".innerdev")),
            ("shared", Value::str(".inner")),
        ]);
        let outer = map(&[
            ("prod", Value::str(".outerprod")),
            ("shared", Value::str(".outer")),
        ]);
        assert_eq!(
            combine(Op::Replace, &inner, &outer),
            map(&[
                ("dev", Value::str(".innerdev")),
                ("shared", Value::str(".outer")),
                ("prod", Value::str(".outerprod")),
            ])
        );
    }

    #[test]
    fn merge_keeps_one_sided_keys() {
        let merged = merge_options(
            &options(&[("dns", opset(&[(Op::Union, Value::str_list(&["outer"]))]))]),
            &options(&[("volumes", opset(&[(Op::Union, Value::str_list(&["inner:/i"]))]))]),
        );
        assert_eq!(merged["dns"][&Op::Union], Value::str_list(&["outer"]));
        assert_eq!(merged["volumes"][&Op::Union], Value::str_list(&["inner:/i"]));
    }

    #[test]
    fn merge_union_reads_inner_before_outer() {
        let merged = merge_options(
            &options(&[("dns_search", opset(&[(Op::Union, Value::str_list(&["outer"]))]))]),
            &options(&[("dns_search", opset(&[(Op::Union, Value::str_list(&["inner"]))]))]),
        );
        assert_eq!(
            merged["dns_search"][&Op::Union],
            Value::str_list(&["inner", "outer"])
        );
    }

    #[test]
    fn merge_is_associative_per_op() {
        let layer = |s: &str| options(&[("name", opset(&[(Op::Suffix, Value::str(s))]))]);
        let (one, two, three) = (layer(".one"), layer(".two"), layer(".three"));
        // outermost first: merge(outer, inner)
        let left = merge_options(&merge_options(&one, &two), &three);
        let right = merge_options(&one, &merge_options(&two, &three));
        assert_eq!(left, right);
        assert_eq!(left["name"][&Op::Suffix], Value::str(".three.two.one"));
    }

    #[test]
    fn apply_suffix_then_suffix_equals_applying_merged() {
        let value = Value::str("svc");
        let step = apply(Op::Suffix, Some(&value), &Value::str(".a"));
        let step = apply(Op::Suffix, Some(&step), &Value::str(".b"));
        let merged = combine(Op::Suffix, &Value::str(".a"), &Value::str(".b"));
        assert_eq!(step, apply(Op::Suffix, Some(&value), &merged));
        assert_eq!(step, Value::str("svc.a.b"));
    }

    #[test]
    fn apply_union_leads_with_the_layer_operand() {
        let current = Value::str_list(&["vardata:/var/lib/app"]);
        let applied = apply(Op::Union, Some(&current), &Value::str_list(&["named:/home"]));
        assert_eq!(
            applied,
            Value::str_list(&["named:/home", "vardata:/var/lib/app"])
        );
    }

    #[test]
    fn apply_missing_value_defaults_to_operand_kind() {
        assert_eq!(
            apply(Op::Suffix, None, &Value::str(".tail")),
            Value::str(".tail")
        );
        assert_eq!(
            apply(Op::Union, None, &Value::str_list(&["a"])),
            Value::str_list(&["a"])
        );
    }

    #[test]
    fn suffix_map_absorbs_list_operand_under_shared() {
        // outer list against an inner map: the list joins the shared
        // bucket, scalar shared values promote to lists first.
        let inner = map(&[
            ("dev", Value::str("innerdev")),
            ("shared", Value::str("innershared")),
        ]);
        assert_eq!(
            combine(Op::Suffix, &inner, &Value::str_list(&[".outer"])),
            map(&[
                ("dev", Value::str("innerdev")),
                ("shared", Value::str_list(&["innershared", ".outer"])),
            ])
        );
    }

    #[test]
    fn prefix_scalar_into_map_lands_in_shared() {
        let inner = map(&[
            ("dev", Value::str("innerdev")),
            ("shared", Value::str("innershared")),
        ]);
        assert_eq!(
            combine(Op::Prefix, &inner, &Value::str("outer.")),
            map(&[
                ("dev", Value::str("innerdev")),
                ("shared", Value::str("outer.innershared")),
            ])
        );
    }

    #[test]
    fn union_map_map_unions_per_key() {
        let inner = map(&[
            ("dev", Value::str_list(&["innerdev"])),
            ("shared", Value::str_list(&["inner"])),
        ]);
        let outer = map(&[
            ("prod", Value::str_list(&["outerprod"])),
            ("shared", Value::str_list(&["outer"])),
        ]);
        assert_eq!(
            combine(Op::Union, &inner, &outer),
            map(&[
                ("dev", Value::str_list(&["innerdev"])),
                ("shared", Value::str_list(&["inner", "outer"])),
                ("prod", Value::str_list(&["outerprod"])),
            ])
        );
    }

    #[test]
    fn merge_layers_across_mixed_operations() {
        let outer = options(&[
            ("name", opset(&[(Op::Suffix, Value::str(".outer"))])),
            ("env", opset(&[(Op::Prefix, Value::str("OUTER_"))])),
            (
                "dns_search",
                opset(&[
                    (Op::Suffix, Value::str(".outer")),
                    (Op::Union, Value::str_list(&["outer"])),
                ]),
            ),
            ("volumes", opset(&[(Op::Union, Value::str_list(&["logdir:/var/log"]))])),
        ]);
        let inner = options(&[
            ("name", opset(&[(Op::Suffix, Value::str(".inner"))])),
            ("hostname", opset(&[(Op::Suffix, Value::str(".inner"))])),
            ("env", opset(&[(Op::Prefix, Value::str("INNER_"))])),
            ("dns_search", opset(&[(Op::Union, Value::str_list(&["inner"]))])),
        ]);
        let merged = merge_options(&outer, &inner);
        assert_eq!(merged["name"][&Op::Suffix], Value::str(".inner.outer"));
        assert_eq!(merged["hostname"][&Op::Suffix], Value::str(".inner"));
        assert_eq!(merged["env"][&Op::Prefix], Value::str("OUTER_INNER_"));
        assert_eq!(merged["dns_search"][&Op::Suffix], Value::str(".outer"));
        assert_eq!(
            merged["dns_search"][&Op::Union],
            Value::str_list(&["inner", "outer"])
        );
        assert_eq!(
            merged["volumes"][&Op::Union],
            Value::str_list(&["logdir:/var/log"])
        );
    }

    #[test]
    fn parse_options_drops_unknown_operations() {
        let block = map(&[(
            "name",
            map(&[
                ("suffix", Value::str(".x")),
                ("exec", Value::str("rm -rf /")),
            ]),
        )]);
        let parsed = parse_options(Some(&block));
        assert_eq!(parsed["name"].len(), 1);
        assert_eq!(parsed["name"][&Op::Suffix], Value::str(".x"));
    }
}
