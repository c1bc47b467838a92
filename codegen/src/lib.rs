//! Code emitter: AST to Python target source with an incremental source map (C8).

pub mod emitter;

pub use emitter::{emit, EmitOutput};
pub use mlpy_types::HostSurface;
