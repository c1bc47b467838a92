//! C10: capability system.
//!
//! Tokens grant `(capability_type, resource glob, operations, validity
//! window)`. Contexts hold a set of granted tokens and nest LIFO, a parent's
//! tokens visible to every descendant. `acquire_scope` is the RAII entry
//! point: the returned guard pops its context off the stack on drop, so a
//! panic or an early return still leaves the stack balanced (spec §4.10
//! "balanced release on every exit path"). `check`/`require` never cache a
//! decision -- a token's validity window means the same triple can start
//! returning `false` between two calls.

use std::collections::HashMap;
use std::time::SystemTime;

use mlpy_types::{ContextId, ResourcePattern, TokenId};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct CapabilityToken {
    pub id: TokenId,
    pub capability_type: String,
    pub resource: ResourcePattern,
    pub operations: Vec<String>,
    pub valid_from: SystemTime,
    pub valid_until: Option<SystemTime>,
}

impl CapabilityToken {
    fn covers(&self, capability_type: &str, resource: &str, operation: &str, at: SystemTime) -> bool {
        self.capability_type == capability_type
            && self.operations.iter().any(|op| op == operation)
            && self.resource.matches(resource)
            && self.valid_from <= at
            && self.valid_until.is_none_or(|until| at < until)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("capability denied: {capability_type} {operation} on `{resource}`")]
pub struct CapabilityDenied {
    pub capability_type: String,
    pub resource: String,
    pub operation: String,
}

struct ContextRecord {
    parent: Option<ContextId>,
    tokens: Vec<TokenId>,
}

#[derive(Default)]
pub struct CapabilitySystem {
    tokens: HashMap<TokenId, CapabilityToken>,
    contexts: HashMap<ContextId, ContextRecord>,
    stack: Vec<ContextId>,
    next_token: u64,
    next_context: u32,
}

impl CapabilitySystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_token(
        &mut self,
        capability_type: impl Into<String>,
        resource: ResourcePattern,
        operations: Vec<String>,
        valid_from: SystemTime,
        valid_until: Option<SystemTime>,
    ) -> TokenId {
        let id = TokenId::new(self.next_token);
        self.next_token += 1;
        self.tokens.insert(id, CapabilityToken { id, capability_type: capability_type.into(), resource, operations, valid_from, valid_until });
        id
    }

    #[must_use]
    pub fn create_context(&mut self, parent: Option<ContextId>) -> ContextId {
        let id = ContextId::new(self.next_context);
        self.next_context += 1;
        self.contexts.insert(id, ContextRecord { parent, tokens: Vec::new() });
        id
    }

    /// Grant a previously created token to a context. Typically called right
    /// after `create_context` before the context is ever made active.
    pub fn grant(&mut self, context: ContextId, token: TokenId) {
        if let Some(record) = self.contexts.get_mut(&context) {
            if !record.tokens.contains(&token) {
                record.tokens.push(token);
            }
        }
    }

    /// Push `context` onto the active stack and return a guard that pops it
    /// back off on drop -- including on an unwinding panic, so the stack
    /// never leaks a context past the scope that acquired it.
    pub fn acquire_scope(&mut self, context: ContextId) -> ScopeGuard<'_> {
        self.stack.push(context);
        ScopeGuard { system: self }
    }

    fn active_context(&self) -> Option<ContextId> {
        self.stack.last().copied()
    }

    /// `true` iff the active context, or one of its ancestors, holds a
    /// token currently valid for this exact `(type, resource, operation)`.
    /// Recomputed on every call; no decision is ever cached.
    #[must_use]
    pub fn check(&self, capability_type: &str, resource: &str, operation: &str) -> bool {
        self.check_at(capability_type, resource, operation, SystemTime::now())
    }

    #[must_use]
    pub fn check_at(&self, capability_type: &str, resource: &str, operation: &str, at: SystemTime) -> bool {
        let mut current = self.active_context();
        while let Some(ctx_id) = current {
            let Some(record) = self.contexts.get(&ctx_id) else { break };
            for token_id in &record.tokens {
                if let Some(token) = self.tokens.get(token_id) {
                    if token.covers(capability_type, resource, operation, at) {
                        return true;
                    }
                }
            }
            current = record.parent;
        }
        false
    }

    pub fn require(&self, capability_type: &str, resource: &str, operation: &str) -> Result<(), CapabilityDenied> {
        if self.check(capability_type, resource, operation) {
            Ok(())
        } else {
            tracing::warn!(capability_type, resource, operation, "capability check denied");
            Err(CapabilityDenied { capability_type: capability_type.to_string(), resource: resource.to_string(), operation: operation.to_string() })
        }
    }
}

/// RAII scope guard returned by [`CapabilitySystem::acquire_scope`].
pub struct ScopeGuard<'a> {
    system: &'a mut CapabilitySystem,
}

impl ScopeGuard<'_> {
    #[must_use]
    pub fn system(&self) -> &CapabilitySystem {
        self.system
    }

    #[must_use]
    pub fn system_mut(&mut self) -> &mut CapabilitySystem {
        self.system
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.system.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::ResourcePattern;
    use std::time::Duration;

    fn pattern(glob: &str) -> ResourcePattern {
        ResourcePattern::compile(glob).unwrap()
    }

    #[test]
    fn grants_and_checks_a_capability() {
        let mut sys = CapabilitySystem::new();
        let token = sys.create_token("file", pattern("/data/*"), vec!["read".to_string()], SystemTime::now() - Duration::from_secs(1), None);
        let ctx = sys.create_context(None);
        sys.grant(ctx, token);
        let guard = sys.acquire_scope(ctx);
        assert!(guard.system().check("file", "/data/report.csv", "read"));
        assert!(!guard.system().check("file", "/etc/passwd", "read"));
        assert!(!guard.system().check("file", "/data/report.csv", "write"));
    }

    #[test]
    fn denies_outside_of_any_acquired_scope() {
        let mut sys = CapabilitySystem::new();
        let token = sys.create_token("file", pattern("/**"), vec!["read".to_string()], SystemTime::now() - Duration::from_secs(1), None);
        let ctx = sys.create_context(None);
        sys.grant(ctx, token);
        assert!(!sys.check("file", "/data/report.csv", "read"));
    }

    #[test]
    fn scope_guard_releases_on_drop() {
        let mut sys = CapabilitySystem::new();
        let token = sys.create_token("file", pattern("/**"), vec!["read".to_string()], SystemTime::now() - Duration::from_secs(1), None);
        let ctx = sys.create_context(None);
        sys.grant(ctx, token);
        {
            let guard = sys.acquire_scope(ctx);
            assert!(guard.system().check("file", "/x", "read"));
        }
        assert!(!sys.check("file", "/x", "read"));
    }

    #[test]
    fn nested_context_inherits_parent_tokens() {
        let mut sys = CapabilitySystem::new();
        let token = sys.create_token("file", pattern("/**"), vec!["read".to_string()], SystemTime::now() - Duration::from_secs(1), None);
        let parent = sys.create_context(None);
        sys.grant(parent, token);
        let mut outer = sys.acquire_scope(parent);
        let child = outer.system_mut().create_context(Some(parent));
        let inner = outer.system_mut().acquire_scope(child);
        assert!(inner.system().check("file", "/x", "read"));
    }

    #[test]
    fn expired_token_stops_matching() {
        let mut sys = CapabilitySystem::new();
        let now = SystemTime::now();
        let token = sys.create_token("file", pattern("/**"), vec!["read".to_string()], now - Duration::from_secs(10), Some(now - Duration::from_secs(5)));
        let ctx = sys.create_context(None);
        sys.grant(ctx, token);
        let guard = sys.acquire_scope(ctx);
        assert!(!guard.system().check_at("file", "/x", "read", now));
    }

    #[test]
    fn require_surfaces_a_descriptive_error() {
        let mut sys = CapabilitySystem::new();
        let ctx = sys.create_context(None);
        let guard = sys.acquire_scope(ctx);
        let err = guard.system().require("file", "/etc/passwd", "read").unwrap_err();
        assert_eq!(err.capability_type, "file");
    }
}
