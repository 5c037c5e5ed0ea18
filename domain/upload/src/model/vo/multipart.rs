use serde::{Deserialize, Serialize};

/// Part reference handed to the final completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// ETag the store returned for the part.
    pub etag: String,
}
