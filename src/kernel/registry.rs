//! The Stage-3 function-name allowlist (spec 4.3, 4.6).
//!
//! Mirrors the teacher's dynamic tool registry shape (name-keyed lookup
//! behind a lock) but the entries here are a fixed allowlist rather than a
//! hot-reloaded schema set: action/vision tool bodies are CV- and
//! browser-backed, and out of scope (spec 1). Each registered [`Tool`] is a
//! placeholder that reports what it would have been called with.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::{HalliganError, Result};
use crate::kernel::value::ToolValue;

/// A single callable entry in the [`ToolRegistry`] (spec 4.3).
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's registered name.
    fn name(&self) -> &str;

    /// Invoke the tool with its call-site keyword arguments.
    async fn call(&self, args: &Map<String, Value>) -> Result<ToolValue>;
}

/// The set of callable names a Stage-3 `call` step may reference (spec 4.3).
///
/// Unlike method dispatch (spec 4.6), registry lookups are by bare name with
/// no notion of a receiving object.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool` under its own name, replacing any prior registration.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        tools.insert(tool.name().to_owned(), tool);
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        tools.get(name).cloned()
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let tools = self.tools.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = tools.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Action-tool names the default registry carries (spec 4.3): interaction
/// primitives a plan's `call` steps may invoke.
pub const ACTION_TOOL_NAMES: &[&str] = &[
    "click",
    "get_all_choices",
    "drag",
    "draw",
    "enter",
    "point",
    "select",
    "slide_x",
    "slide_y",
    "explore",
];

/// Vision-tool names the default registry carries (spec 4.3): model-backed
/// query primitives a plan's `call` steps may invoke.
pub const VISION_TOOL_NAMES: &[&str] = &["mark", "focus", "ask", "rank", "compare", "match"];

/// A placeholder [`Tool`] standing in for an out-of-scope action/vision
/// tool body: records nothing, always fails with a clear "not implemented"
/// tool error so a caller can tell a missing registration (`unknown tool`)
/// apart from an unimplemented one (spec 4.3).
struct StubTool {
    name: String,
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<ToolValue> {
        Err(HalliganError::tool(format!(
            "tool '{}' has no body in this build",
            self.name
        )))
    }
}

/// Build the default registry: every name in [`ACTION_TOOL_NAMES`] and
/// [`VISION_TOOL_NAMES`], backed by [`StubTool`] placeholders (spec 4.3).
pub fn build_default_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    for name in ACTION_TOOL_NAMES.iter().chain(VISION_TOOL_NAMES) {
        registry.register(Arc::new(StubTool {
            name: (*name).to_owned(),
        }));
    }
    registry
}
