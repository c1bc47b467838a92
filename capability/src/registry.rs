//! C9: safe attribute registry.
//!
//! A whitelist mediating every attribute access compiled code makes against
//! a host value. Unregistered attributes -- and dunder names unconditionally,
//! regardless of registration -- are denied. The denial is always the same
//! shape: the mediator never tells a caller *why* access failed (unknown
//! attribute vs. wrong access kind vs. missing capability), which would let
//! an attacker probe the host's type surface one rejection at a time
//! (fail-closed, no information leak).

use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    Call,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEntry {
    pub host_type: String,
    pub attr: String,
    pub access: AccessKind,
    pub required_capabilities: Vec<String>,
    pub docstring: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("attribute `{host_type}.{attr}` is already registered")]
    DuplicateRegistration { host_type: String, attr: String },
    #[error("dunder attribute names are never registrable")]
    DunderNameRejected { attr: String },
}

/// The single error surfaced to compiled code for any denied attribute
/// access. Deliberately uninformative: see module docs.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("attribute access denied")]
pub struct AccessDenied;

#[derive(Debug, Default)]
pub struct SafeAttributeRegistry {
    entries: HashMap<(String, String), AttributeEntry>,
}

impl SafeAttributeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        host_type: impl Into<String>,
        attr: impl Into<String>,
        access: AccessKind,
        required_capabilities: Vec<String>,
        docstring: impl Into<String>,
    ) -> Result<(), RegistrationError> {
        let host_type = host_type.into();
        let attr = attr.into();
        if is_dunder(&attr) {
            return Err(RegistrationError::DunderNameRejected { attr });
        }
        let key = (host_type.clone(), attr.clone());
        if self.entries.contains_key(&key) {
            return Err(RegistrationError::DuplicateRegistration { host_type, attr });
        }
        self.entries.insert(key, AttributeEntry { host_type, attr, access, required_capabilities, docstring: docstring.into() });
        Ok(())
    }

    /// Look up a registered entry. Returns `None` uniformly for unknown
    /// attributes and for dunder names, even if a caller later registers a
    /// same-named non-dunder attribute (dunders are never indexable).
    #[must_use]
    pub fn lookup(&self, host_type: &str, attr: &str) -> Option<&AttributeEntry> {
        if is_dunder(attr) {
            return None;
        }
        self.entries.get(&(host_type.to_string(), attr.to_string()))
    }

    /// Resolve an access attempt to either the entry or the uniform denial.
    /// This is the one function compiled code's attribute-access sites call
    /// through (spec §4.9).
    pub fn check_access(&self, host_type: &str, attr: &str) -> Result<&AttributeEntry, AccessDenied> {
        self.lookup(host_type, attr).ok_or(AccessDenied)
    }

    #[must_use]
    pub fn list_safe_attrs(&self, host_type: &str) -> Vec<&AttributeEntry> {
        let mut attrs: Vec<_> = self.entries.values().filter(|e| e.host_type == host_type).collect();
        attrs.sort_by(|a, b| a.attr.cmp(&b.attr));
        attrs
    }
}

fn is_dunder(attr: &str) -> bool {
    attr.starts_with("__") && attr.ends_with("__") && attr.len() > 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_and_looks_up_an_attribute() {
        let mut registry = SafeAttributeRegistry::new();
        registry.register("File", "read", AccessKind::Call, vec!["file.read".to_string()], "read file contents").unwrap();
        assert!(registry.lookup("File", "read").is_some());
    }

    #[test]
    fn rejects_dunder_registration_unconditionally() {
        let mut registry = SafeAttributeRegistry::new();
        let err = registry.register("File", "__class__", AccessKind::Read, vec![], "").unwrap_err();
        assert!(matches!(err, RegistrationError::DunderNameRejected { .. }));
    }

    #[test]
    fn rejects_duplicate_registration() {
        let mut registry = SafeAttributeRegistry::new();
        registry.register("File", "read", AccessKind::Call, vec![], "").unwrap();
        let err = registry.register("File", "read", AccessKind::Call, vec![], "").unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRegistration { .. }));
    }

    #[test]
    fn denies_unregistered_attribute_uniformly() {
        let registry = SafeAttributeRegistry::new();
        assert_eq!(registry.check_access("File", "delete").unwrap_err(), AccessDenied);
    }

    #[test]
    fn denies_dunder_even_if_a_real_attribute_would_share_the_name() {
        let registry = SafeAttributeRegistry::new();
        assert!(registry.lookup("File", "__init__").is_none());
    }

    #[test]
    fn list_safe_attrs_is_sorted_and_scoped_to_host_type() {
        let mut registry = SafeAttributeRegistry::new();
        registry.register("File", "write", AccessKind::Call, vec![], "").unwrap();
        registry.register("File", "read", AccessKind::Call, vec![], "").unwrap();
        registry.register("Socket", "connect", AccessKind::Call, vec![], "").unwrap();
        let attrs = registry.list_safe_attrs("File");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].attr, "read");
        assert_eq!(attrs[1].attr, "write");
    }
}
