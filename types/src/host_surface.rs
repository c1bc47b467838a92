//! The host module/function whitelist the emitter and the host embedding
//! layer both need (spec §4.8, §6): which ML import names resolve to which
//! target-language module paths, and which bare names may appear in call
//! position and be routed through `safe_call`. Lives in `mlpy-types`
//! rather than `mlpy-codegen` or `mlpy-host` so neither has to depend on
//! the other just to share this one value type.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSurface {
    /// ML import name -> target-language module path.
    pub modules: HashMap<String, String>,
    /// ML names reachable as bare calls, bridged through `safe_call`.
    pub functions: HashSet<String>,
}

impl HostSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_module(&mut self, ml_name: impl Into<String>, target_path: impl Into<String>) {
        self.modules.insert(ml_name.into(), target_path.into());
    }

    pub fn register_function(&mut self, ml_name: impl Into<String>) {
        self.functions.insert(ml_name.into());
    }
}
