use serde::{Deserialize, Serialize};

/// One contiguous byte-range slice of an upload, uploaded independently.
///
/// The ordered part list of one upload partitions `[0, file_size)` with no
/// gaps or overlaps, and part numbers are a dense `1..=n` sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    /// 1-based part number.
    pub part_number: u32,
    /// Range start offset, inclusive.
    pub start: u64,
    /// Range end offset, exclusive.
    pub end: u64,
    /// Range length in bytes.
    pub size: u64,
    /// ETag returned by the store once the part is uploaded.
    pub etag: Option<String>,
    pub state: PartState,
}

/// State of one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartState {
    Pending,
    Uploading,
    Completed,
    Failed,
}
