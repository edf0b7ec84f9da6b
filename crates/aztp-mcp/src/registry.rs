//! Static table of tool descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RegistryError;

/// A named, schema-described tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Immutable, ordered tool table. Names are unique.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Build the table in declaration order.
    pub fn new(tools: Vec<ToolDescriptor>) -> Result<Self, RegistryError> {
        for (i, tool) in tools.iter().enumerate() {
            if tool.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if tools[..i].iter().any(|t| t.name == tool.name) {
                return Err(RegistryError::DuplicateTool(tool.name.clone()));
            }
        }
        Ok(Self { tools })
    }

    /// All descriptors, in declaration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
