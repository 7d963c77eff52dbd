use std::fmt;

use serde::{Deserialize, Serialize};

/// A node in the workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InputCollection,
    ContentCreation,
    ContentApproval,
    Scheduling,
    Posting,
    Logging,
}

impl Stage {
    /// Every run starts here.
    pub const ENTRY: Stage = Stage::InputCollection;

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InputCollection => "input_collection",
            Stage::ContentCreation => "content_creation",
            Stage::ContentApproval => "content_approval",
            Stage::Scheduling => "scheduling",
            Stage::Posting => "posting",
            Stage::Logging => "logging",
        }
    }

    /// Logging has no outgoing edge.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Logging)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
