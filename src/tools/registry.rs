//! Tool registry for the housing tool set.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::KnowledgeConfig;
use crate::inference::types::ToolDefinition;

use super::{
    BoilerInfoTool, EscalateToHumanTool, KnowledgeSearchTool, RepairGuidanceTool,
    ScheduleEngineerTool, Tool, ToolError,
};

/// Registry of available tools, keyed by name.
///
/// Built once at startup and shared read-only across turns.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every housing tool registered.
    pub fn with_housing_tools(knowledge: &KnowledgeConfig) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        registry.register(Arc::new(KnowledgeSearchTool::new(knowledge.clone())?));
        registry.register(Arc::new(BoilerInfoTool));
        registry.register(Arc::new(RepairGuidanceTool));
        registry.register(Arc::new(ScheduleEngineerTool));
        registry.register(Arc::new(EscalateToHumanTool));

        tracing::info!(
            tool_count = registry.len(),
            knowledge_enabled = knowledge.is_enabled(),
            "registered housing tools"
        );
        Ok(registry)
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "replaced existing tool registration");
        } else {
            tracing::debug!(tool = %name, "registered tool");
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions for OpenAI function calling.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| {
                ToolDefinition::function(
                    tool.name(),
                    tool.description(),
                    tool.parameters_schema(),
                )
            })
            .collect()
    }
}
