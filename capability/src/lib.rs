//! Safe attribute registry and capability-based security runtime (C9, C10).

pub mod registry;
pub mod system;

pub use registry::{AccessDenied, AccessKind, AttributeEntry, RegistrationError, SafeAttributeRegistry};
pub use system::{CapabilityDenied, CapabilitySystem, CapabilityToken, ScopeGuard};
