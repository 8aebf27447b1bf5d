//! Tool adapters consumed by the tool execution stage.
//!
//! Each adapter is a narrow async trait over an external service (web search,
//! long-term memory, math evaluation). Implementations live outside this
//! crate; an adapter call either returns data or fails with its own error
//! variant, and the engine confines that failure to a single trace step.

mod math;
mod memory;
mod web;

pub use math::{MathRequest, MathResult, MathTool};
pub use memory::{Memory, MemoryQuery, MemoryTool};
pub use web::{SearchResult, WebTool};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Tool tag used in queries, router rules and trace steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Web,
    Memory,
    Math,
    /// LLM analysis stages; always run, never routed
    Analysis,
}

impl ToolKind {
    /// Every tool tag.
    pub const ALL: [ToolKind; 4] = [Self::Web, Self::Memory, Self::Math, Self::Analysis];

    /// Routed tools in their fixed invocation order.
    pub const INVOCATION_ORDER: [ToolKind; 3] = [Self::Web, Self::Memory, Self::Math];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Memory => "memory",
            Self::Math => "math",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "memory" => Ok(Self::Memory),
            "math" => Ok(Self::Math),
            "analysis" => Ok(Self::Analysis),
            other => Err(Error::invalid_query(format!("unknown tool: {}", other))),
        }
    }
}
