// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Deep Assignment Engine
 * Sets a value at a parsed property path, auto-creating intermediate
 * containers the way the lodash-style deep-set utilities do
 *
 * Detects and reproduces (unsafe policy) or blocks (hardened policy):
 * - __proto__ pollution via key paths
 * - constructor.prototype pollution
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::PathError;
use crate::path::{PathSegment, PropertyPath};
use crate::store::SharedTemplate;

/// How reserved segments in user-supplied key paths are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentPolicy {
    /// Reject any path touching the reserved deny-list before traversal
    Hardened,
    /// Resolve reserved segments into the shared template, reproducing the
    /// vulnerable deep-merge behavior for detection tooling to find
    Unsafe,
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        AssignmentPolicy::Hardened
    }
}

impl std::fmt::Display for AssignmentPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentPolicy::Hardened => write!(f, "hardened"),
            AssignmentPolicy::Unsafe => write!(f, "unsafe"),
        }
    }
}

impl std::str::FromStr for AssignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hardened" => Ok(AssignmentPolicy::Hardened),
            "unsafe" => Ok(AssignmentPolicy::Unsafe),
            other => Err(format!("Unknown assignment policy: {}", other)),
        }
    }
}

/// Per-key result of a mutation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Accepted,
    RejectedUnsafeKey,
    RejectedInvalidPath,
}

/// Per-key report returned to the caller, never silently swallowed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOutcome {
    pub key: String,
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AssignmentOutcome {
    pub fn accepted(key: &str) -> Self {
        Self {
            key: key.to_string(),
            status: AssignmentStatus::Accepted,
            reason: None,
        }
    }

    pub fn rejected_unsafe(key: &str, segment: &str, position: usize) -> Self {
        Self {
            key: key.to_string(),
            status: AssignmentStatus::RejectedUnsafeKey,
            reason: Some(format!(
                "reserved segment '{}' at position {}",
                segment, position
            )),
        }
    }

    pub fn rejected_invalid(key: &str, err: &PathError) -> Self {
        Self {
            key: key.to_string(),
            status: AssignmentStatus::RejectedInvalidPath,
            reason: Some(err.to_string()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == AssignmentStatus::Accepted
    }
}

/// Where an unsafe-policy walk ends up once reserved segments resolve
enum Route<'a> {
    /// Plain own-property assignment
    Own,
    /// Traversal re-roots at the shared template after `prefix` containers
    /// are materialized on the own side
    Template {
        prefix: &'a [PathSegment],
        rest: &'a [PathSegment],
    },
    /// The write lands on a host object outside this model (a bare
    /// `constructor` mid-path); nothing observable changes
    OutOfModel,
}

fn route<'a>(segments: &'a [PathSegment], policy: AssignmentPolicy) -> Route<'a> {
    if policy == AssignmentPolicy::Hardened {
        return Route::Own;
    }
    for (i, seg) in segments.iter().enumerate() {
        let PathSegment::Key(name) = seg else { continue };
        match name.as_str() {
            "__proto__" => {
                return Route::Template {
                    prefix: &segments[..i],
                    rest: &segments[i + 1..],
                };
            }
            "constructor" => {
                // A trailing `constructor` is an ordinary own key. Followed
                // by `prototype` it reaches the shared template; followed by
                // anything else it lands on the constructor function itself.
                match segments.get(i + 1) {
                    None => return Route::Own,
                    Some(PathSegment::Key(next)) if next == "prototype" => {
                        return Route::Template {
                            prefix: &segments[..i],
                            rest: &segments[i + 2..],
                        };
                    }
                    Some(_) => return Route::OutOfModel,
                }
            }
            // `prototype` on its own is an ordinary key on plain objects
            _ => {}
        }
    }
    Route::Own
}

/// Assign `value` at `path`, auto-creating intermediate containers.
///
/// Key segments create objects, index segments create arrays padded with
/// nulls, and an existing intermediate of the wrong shape is replaced by a
/// fresh container of the required shape. The later write wins at the leaf;
/// siblings written earlier are preserved.
///
/// Under [`AssignmentPolicy::Unsafe`] a `__proto__` segment, or the pair
/// `constructor.prototype`, re-roots the walk at the shared template, so the
/// assigned property subsequently shows through on every document sharing
/// that template. Callers running hardened must reject reserved paths before
/// calling; this function does not re-validate.
pub fn deep_set(
    own: &mut Map<String, Value>,
    template: &SharedTemplate,
    path: &PropertyPath,
    value: Value,
    policy: AssignmentPolicy,
    max_index: usize,
) {
    match route(path.segments(), policy) {
        Route::Own => assign_into_map(own, path.segments(), value, max_index),
        Route::Template { prefix, rest } => {
            if !prefix.is_empty() {
                ensure_into_map(own, prefix, max_index);
            }
            if rest.is_empty() {
                // A bare template reference as the leaf swaps an object's
                // prototype in the runtime being modeled; the bench leaves
                // the template alone.
                return;
            }
            let mut tpl = template.write();
            assign_into_map(&mut tpl, rest, value, max_index);
        }
        Route::OutOfModel => {}
    }
}

/// Assignment rooted at an object map
fn assign_into_map(map: &mut Map<String, Value>, segments: &[PathSegment], value: Value, max_index: usize) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    // An index segment addressing an object writes a string key
    let key = match head {
        PathSegment::Key(k) => k.clone(),
        PathSegment::Index(i) => i.to_string(),
    };
    if rest.is_empty() {
        map.insert(key, value);
        return;
    }
    let slot = map.entry(key).or_insert(Value::Null);
    assign_into_value(slot, rest, value, max_index);
}

fn assign_into_value(current: &mut Value, segments: &[PathSegment], value: Value, max_index: usize) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match head {
        PathSegment::Index(index) => assign_at_index(current, *index, rest, value, max_index),
        PathSegment::Key(key) => {
            // A numeric key landing on an existing array addresses a slot
            if current.is_array() {
                if let Ok(index) = key.parse::<usize>() {
                    if index <= max_index {
                        return assign_at_index(current, index, rest, value, max_index);
                    }
                }
            }
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                if rest.is_empty() {
                    map.insert(key.clone(), value);
                } else {
                    let slot = map.entry(key.clone()).or_insert(Value::Null);
                    assign_into_value(slot, rest, value, max_index);
                }
            }
        }
    }
}

fn assign_at_index(current: &mut Value, index: usize, rest: &[PathSegment], value: Value, max_index: usize) {
    if !current.is_array() {
        *current = Value::Array(Vec::new());
    }
    if let Value::Array(arr) = current {
        if arr.len() <= index {
            arr.resize(index + 1, Value::Null);
        }
        if rest.is_empty() {
            arr[index] = value;
        } else {
            assign_into_value(&mut arr[index], rest, value, max_index);
        }
    }
}

/// Materialize the containers a walk traverses without assigning a leaf.
/// Used for the own-side prefix in front of a template re-root.
fn ensure_into_map(map: &mut Map<String, Value>, segments: &[PathSegment], max_index: usize) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let key = match head {
        PathSegment::Key(k) => k.clone(),
        PathSegment::Index(i) => i.to_string(),
    };
    let slot = map.entry(key).or_insert(Value::Null);
    ensure_into_value(slot, rest, max_index);
}

fn ensure_into_value(current: &mut Value, segments: &[PathSegment], max_index: usize) {
    let Some((head, rest)) = segments.split_first() else {
        // End of the prefix: the walk continues through this slot, so it
        // must be a container.
        if !current.is_object() && !current.is_array() {
            *current = Value::Object(Map::new());
        }
        return;
    };
    match head {
        PathSegment::Index(index) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            if let Value::Array(arr) = current {
                if arr.len() <= *index {
                    arr.resize(index + 1, Value::Null);
                }
                ensure_into_value(&mut arr[*index], rest, max_index);
            }
        }
        PathSegment::Key(key) => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            if let Value::Object(map) = current {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                ensure_into_value(slot, rest, max_index);
            }
        }
    }
}
