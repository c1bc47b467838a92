//! Host module registration bridge presented as part of the host embedding
//! API (spec §6): joins a host function's JSON param schema and required
//! capabilities at registration time, and produces the whitelist the
//! emitter (C8) compiles against.

pub mod registry;

pub use registry::{HostCallError, HostCallable, HostFunctionSpec, HostRegistry, RequiredCapabilityRef, ReturnKind};
