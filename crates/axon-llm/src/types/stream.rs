use serde::{Deserialize, Serialize};

use super::response::{FinishReason, ResponseMeta, Usage};

/// One item of an incremental provider completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Incremental content delta
    Delta(StreamDelta),
    /// Final usage statistics (sent at stream end)
    Usage(Usage),
    /// Stream has completed
    Done,
}

/// Incremental update within a streaming response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Metadata of the chunk carrying this delta
    pub meta: ResponseMeta,
    /// Choice index this delta belongs to
    pub index: u32,
    /// Incremental text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reason generation finished (present on final delta)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}
