// Copyright (c) 2025 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Shared State Store
 * Process-scoped mutable object plus the behavioral template its documents
 * inherit from
 *
 * The store stands in for the single shared object of the vulnerable app
 * pattern: one mutable mapping, shared across every request, written through
 * attacker-controlled key paths. The template is the shared prototype those
 * writes can reach when the assignment policy is unsafe.
 *
 * @copyright 2025 Bountyy Oy
 * @license Proprietary
 */

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::assign::{deep_set, AssignmentOutcome, AssignmentPolicy};
use crate::path::{PropertyPath, DEFAULT_MAX_AUTO_INDEX};

/// The behavioral template shared by every document in the process.
///
/// Writes to it are observed by all documents created against it, which is
/// exactly the blast radius prototype pollution exploits.
#[derive(Clone, Default)]
pub struct SharedTemplate {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl SharedTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Property lookup on the template itself
    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.read().get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Copy of the current template properties
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().clone()
    }

    pub(crate) fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Map<String, Value>> {
        self.inner.write()
    }
}

/// A JSON document with own properties and a template to fall back to.
///
/// Lookup resolves own properties first, then the template. Serialization
/// covers own properties only, matching JSON.stringify semantics, which
/// skip inherited properties.
#[derive(Clone)]
pub struct Document {
    own: Map<String, Value>,
    template: SharedTemplate,
}

impl Document {
    pub fn with_template(template: SharedTemplate) -> Self {
        Self {
            own: Map::new(),
            template,
        }
    }

    /// Own property, else template fallback
    pub fn get(&self, name: &str) -> Option<Value> {
        self.own
            .get(name)
            .cloned()
            .or_else(|| self.template.get(name))
    }

    /// Own property only, no fallback
    pub fn get_own(&self, name: &str) -> Option<&Value> {
        self.own.get(name)
    }

    pub fn set_own(&mut self, name: &str, value: Value) {
        self.own.insert(name.to_string(), value);
    }
}

/// The single process-wide mutable object behind the HTTP surface.
///
/// Created once at startup and passed by reference into the request
/// handlers; tests build isolated instances instead of sharing a global.
pub struct StateStore {
    root: RwLock<Map<String, Value>>,
    template: SharedTemplate,
    policy: AssignmentPolicy,
    max_auto_index: usize,
}

impl StateStore {
    pub fn new(policy: AssignmentPolicy) -> Self {
        Self::with_limits(policy, DEFAULT_MAX_AUTO_INDEX)
    }

    pub fn with_limits(policy: AssignmentPolicy, max_auto_index: usize) -> Self {
        if policy == AssignmentPolicy::Unsafe {
            warn!("Unsafe assignment policy active: reserved key paths will reach the shared template");
        }
        Self {
            root: RwLock::new(Map::new()),
            template: SharedTemplate::new(),
            policy,
            max_auto_index,
        }
    }

    pub fn policy(&self) -> AssignmentPolicy {
        self.policy
    }

    /// JSON dump of the shared object's own enumerable properties
    pub fn dump(&self) -> Value {
        Value::Object(self.root.read().clone())
    }

    /// Apply one key/value pair from a mutation request.
    ///
    /// The operation is atomic per key: the path is parsed and checked
    /// against the policy in full before any container is created, and a
    /// rejected key leaves both the store and the template untouched.
    pub fn apply(&self, raw_key: &str, value: Value) -> AssignmentOutcome {
        let path = match PropertyPath::parse_with_cap(raw_key, self.max_auto_index) {
            Ok(path) => path,
            Err(err) => {
                debug!(key = raw_key, error = %err, "Rejected malformed key path");
                return AssignmentOutcome::rejected_invalid(raw_key, &err);
            }
        };

        if self.policy == AssignmentPolicy::Hardened {
            if let Some((position, segment)) = path.reserved_segment() {
                debug!(
                    key = raw_key,
                    segment = segment,
                    position = position,
                    "Rejected reserved key path"
                );
                return AssignmentOutcome::rejected_unsafe(raw_key, segment, position);
            }
        }

        let mut root = self.root.write();
        deep_set(
            &mut root,
            &self.template,
            &path,
            value,
            self.policy,
            self.max_auto_index,
        );
        AssignmentOutcome::accepted(raw_key)
    }

    /// A fresh, unrelated document sharing this store's template.
    ///
    /// This is the observation point for cross-object contamination: after a
    /// template write, every document built here reports the injected
    /// property even though its own properties are empty.
    pub fn fresh_document(&self) -> Document {
        Document::with_template(self.template.clone())
    }

    pub fn template(&self) -> SharedTemplate {
        self.template.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assign::AssignmentStatus;
    use serde_json::json;

    #[test]
    fn test_fresh_store_dumps_empty_object() {
        let store = StateStore::new(AssignmentPolicy::Hardened);
        assert_eq!(store.dump(), json!({}));
    }

    #[test]
    fn test_apply_nested_path() {
        let store = StateStore::new(AssignmentPolicy::Hardened);
        let outcome = store.apply("a.b.c", json!(5));

        assert!(outcome.is_accepted());
        assert_eq!(store.dump(), json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn test_overlapping_writes_preserve_siblings() {
        let store = StateStore::new(AssignmentPolicy::Hardened);
        store.apply("user.name", json!("alice"));
        store.apply("user.role", json!("viewer"));
        store.apply("user.role", json!("admin"));

        assert_eq!(
            store.dump(),
            json!({"user": {"name": "alice", "role": "admin"}})
        );
    }

    #[test]
    fn test_malformed_key_is_reported_and_ignored() {
        let store = StateStore::new(AssignmentPolicy::Hardened);
        let outcome = store.apply("a..b", json!(1));

        assert_eq!(outcome.status, AssignmentStatus::RejectedInvalidPath);
        assert!(outcome.reason.is_some());
        assert_eq!(store.dump(), json!({}));
    }

    #[test]
    fn test_hardened_rejects_reserved_paths_unchanged_store() {
        let store = StateStore::new(AssignmentPolicy::Hardened);
        store.apply("safe", json!(1));

        for key in ["__proto__.polluted", "constructor.prototype.x", "a.prototype.b"] {
            let outcome = store.apply(key, json!(true));
            assert_eq!(outcome.status, AssignmentStatus::RejectedUnsafeKey, "{}", key);
        }

        assert_eq!(store.dump(), json!({"safe": 1}));
        assert!(store.template().is_empty());
        assert_eq!(store.fresh_document().get("polluted"), None);
    }

    #[test]
    fn test_unsafe_policy_contaminates_unrelated_documents() {
        let store = StateStore::new(AssignmentPolicy::Unsafe);
        let outcome = store.apply("__proto__.polluted", json!(true));

        assert!(outcome.is_accepted());
        // Not an own property, so the dump stays clean
        assert_eq!(store.dump(), json!({}));
        // Every document sharing the template now reports the property
        let unrelated = store.fresh_document();
        assert_eq!(unrelated.get("polluted"), Some(json!(true)));
        assert_eq!(unrelated.get_own("polluted"), None);
    }

    #[test]
    fn test_own_property_shadows_template() {
        let store = StateStore::new(AssignmentPolicy::Unsafe);
        store.apply("__proto__.role", json!("admin"));

        let mut doc = store.fresh_document();
        assert_eq!(doc.get("role"), Some(json!("admin")));

        doc.set_own("role", json!("viewer"));
        assert_eq!(doc.get("role"), Some(json!("viewer")));
    }

    #[test]
    fn test_index_above_cap_is_invalid_path() {
        let store = StateStore::with_limits(AssignmentPolicy::Hardened, 16);
        let outcome = store.apply("a[17]", json!(1));

        assert_eq!(outcome.status, AssignmentStatus::RejectedInvalidPath);
        assert_eq!(store.dump(), json!({}));

        let outcome = store.apply("a[16]", json!(1));
        assert!(outcome.is_accepted());
    }
}
