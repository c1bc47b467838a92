//! Debug index: bidirectional source maps, breakpoint resolution, and
//! frame-variable filtering (C12).

pub mod breakpoint;
pub mod index;

pub use breakpoint::{BreakpointError, BreakpointId, BreakpointState, BreakpointTable};
pub use index::{is_synthetic_name, visible_frame_variables, DebugIndex};
