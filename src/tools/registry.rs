use rustc_hash::FxHashMap;
use std::sync::Arc;

use super::Tool;
use crate::llm::ToolSchema;

/// Name-keyed tool dispatch for one specialist domain.
///
/// Resolution happens once per tool call; a name the model invented resolves
/// to `None` and the agent loop synthesizes a failure result instead of
/// crashing or silently skipping.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: FxHashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Re-registering a name replaces the
    /// previous handler.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name();
        if self.tools.insert(name, tool).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Builder-style registration.
    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Resolve a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas for every registered tool, in registration order; this is the
    /// shape handed to the inference interface.
    #[must_use]
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolError;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echoes its input"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn invoke(&self, args: Value) -> Result<String, ToolError> {
            Ok(args.to_string())
        }
    }

    #[test]
    fn lookup_is_by_name_with_explicit_miss() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("made_up_by_the_model").is_none());
    }

    #[test]
    fn schemas_preserve_registration_order() {
        let registry = ToolRegistry::new().with_tool(Arc::new(EchoTool));
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
    }
}
