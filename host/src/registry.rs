//! Host module registration bridge (spec §6 `register_host_module`,
//! `set_safe_attribute`). Joins a host function's param schema and
//! required-capability list at registration time, validating arguments
//! against that schema with `jsonschema::validator_for`.

use std::collections::HashMap;
use std::sync::Arc;

use mlpy_capability::{CapabilityDenied, CapabilitySystem};
use mlpy_types::HostSurface;
use serde_json::Value;

/// A host function's return value shape, used only for documentation and
/// IDE tooling -- the emitter's own inferred-kind tracking (C4) is
/// independent of this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Unit,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredCapabilityRef {
    pub capability_type: String,
    pub operation: String,
}

pub type HostCallable = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct HostFunctionSpec {
    pub ml_name: String,
    pub required_capabilities: Vec<RequiredCapabilityRef>,
    pub param_schema: Value,
    pub return_kind: ReturnKind,
    pub callable: HostCallable,
}

#[derive(Debug, thiserror::Error)]
pub enum HostCallError {
    #[error("`{0}` is not a registered host function")]
    UnknownFunction(String),
    #[error("`{schema_error}` rejected schema for host function registration `{ml_name}`")]
    InvalidSchema { ml_name: String, schema_error: String },
    #[error("arguments to `{name}` failed schema validation: {message}")]
    InvalidArgs { name: String, message: String },
    #[error("{0}")]
    CapabilityDenied(#[from] CapabilityDenied),
    #[error("host function `{name}` raised: {message}")]
    Execution { name: String, message: String },
}

struct RegisteredFunction {
    spec: HostFunctionSpec,
}

/// Owns every registered host module/function and produces the
/// [`HostSurface`] the emitter needs, plus runtime dispatch for the
/// trusted in-process execution path (§4.13: "either in-process exec
/// (trusted) or C11").
#[derive(Default)]
pub struct HostRegistry {
    surface: HostSurface,
    functions: HashMap<String, RegisteredFunction>,
}

impl HostRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host module: `target_path` is what `import name;`
    /// translates to, and every entry's `ml_name` becomes callable in bare
    /// call position through `safe_call` (spec §4.8 three-way call
    /// classification, case (b)).
    pub fn register_host_module(&mut self, ml_name: impl Into<String>, target_path: impl Into<String>, entries: Vec<HostFunctionSpec>) {
        let ml_name = ml_name.into();
        self.surface.register_module(&ml_name, target_path);
        for spec in entries {
            self.surface.register_function(spec.ml_name.clone());
            tracing::debug!(module = %ml_name, function = %spec.ml_name, "registered host function");
            self.functions.insert(spec.ml_name.clone(), RegisteredFunction { spec });
        }
    }

    #[must_use]
    pub fn host_surface(&self) -> HostSurface {
        self.surface.clone()
    }

    #[must_use]
    pub fn required_capabilities(&self, ml_name: &str) -> Option<&[RequiredCapabilityRef]> {
        self.functions.get(ml_name).map(|f| f.spec.required_capabilities.as_slice())
    }

    /// Validate `args` against the function's declared schema, check every
    /// required capability against `resource`, then invoke it. The
    /// capability check happens strictly before invocation and is never
    /// cached (spec §4.10: "the `safe_call` shim performs the capability
    /// check before invoking the host function").
    pub fn call(&self, ml_name: &str, args: &Value, capabilities: &CapabilitySystem, resource: &str) -> Result<Value, HostCallError> {
        let registered = self.functions.get(ml_name).ok_or_else(|| HostCallError::UnknownFunction(ml_name.to_string()))?;
        let spec = &registered.spec;

        let validator = jsonschema::validator_for(&spec.param_schema)
            .map_err(|e| HostCallError::InvalidSchema { ml_name: ml_name.to_string(), schema_error: e.to_string() })?;
        if let Err(err) = validator.validate(args) {
            return Err(HostCallError::InvalidArgs { name: ml_name.to_string(), message: err.to_string() });
        }

        for cap in &spec.required_capabilities {
            capabilities.require(&cap.capability_type, resource, &cap.operation)?;
        }

        (spec.callable)(args).map_err(|message| HostCallError::Execution { name: ml_name.to_string(), message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::ResourcePattern;
    use std::time::SystemTime;

    fn identity_spec(name: &str, caps: Vec<RequiredCapabilityRef>) -> HostFunctionSpec {
        HostFunctionSpec {
            ml_name: name.to_string(),
            required_capabilities: caps,
            param_schema: serde_json::json!({"type": "array", "items": {"type": "number"}}),
            return_kind: ReturnKind::Number,
            callable: Arc::new(|args| Ok(args.clone())),
        }
    }

    #[test]
    fn registering_a_module_populates_the_host_surface() {
        let mut registry = HostRegistry::new();
        registry.register_host_module("math", "mlpy_stdlib.math", vec![identity_spec("sqrt", vec![])]);
        let surface = registry.host_surface();
        assert_eq!(surface.modules.get("math"), Some(&"mlpy_stdlib.math".to_string()));
        assert!(surface.functions.contains("sqrt"));
    }

    #[test]
    fn call_validates_arguments_against_the_declared_schema() {
        let mut registry = HostRegistry::new();
        registry.register_host_module("math", "mlpy_stdlib.math", vec![identity_spec("sqrt", vec![])]);
        let caps = CapabilitySystem::new();
        let bad_args = serde_json::json!(["not", "numbers"]);
        let err = registry.call("sqrt", &bad_args, &caps, "n/a").unwrap_err();
        assert!(matches!(err, HostCallError::InvalidArgs { .. }));
    }

    #[test]
    fn call_denies_when_the_required_capability_is_not_granted() {
        let mut registry = HostRegistry::new();
        let caps_required = vec![RequiredCapabilityRef { capability_type: "file".to_string(), operation: "read".to_string() }];
        registry.register_host_module("file", "mlpy_stdlib.file", vec![identity_spec("read_file", caps_required)]);
        let caps = CapabilitySystem::new();
        let err = registry.call("read_file", &serde_json::json!([]), &caps, "/etc/passwd").unwrap_err();
        assert!(matches!(err, HostCallError::CapabilityDenied(_)));
    }

    #[test]
    fn call_succeeds_once_the_capability_is_granted_and_active() {
        let mut registry = HostRegistry::new();
        let caps_required = vec![RequiredCapabilityRef { capability_type: "file".to_string(), operation: "read".to_string() }];
        registry.register_host_module("file", "mlpy_stdlib.file", vec![identity_spec("read_file", caps_required)]);

        let mut caps = CapabilitySystem::new();
        let token = caps.create_token("file", ResourcePattern::compile("/data/*").unwrap(), vec!["read".to_string()], SystemTime::now(), None);
        let ctx = caps.create_context(None);
        caps.grant(ctx, token);
        let scope = caps.acquire_scope(ctx);

        let result = registry.call("read_file", &serde_json::json!([]), scope.system(), "/data/report.csv").unwrap();
        assert_eq!(result, serde_json::json!([]));
    }

    #[test]
    fn calling_an_unregistered_function_is_an_error() {
        let registry = HostRegistry::new();
        let caps = CapabilitySystem::new();
        assert!(matches!(registry.call("ghost", &serde_json::json!([]), &caps, "x"), Err(HostCallError::UnknownFunction(_))));
    }
}
