use domain_upload::exception::{UploadException, UploadResult};
use domain_upload::model::entity::{PartInfo, PartState};
use domain_upload::model::vo::{MAX_PARTS, MIN_PART_SIZE};

/// Compute the part layout for a payload of `file_size` bytes.
///
/// `part_size` is floor-clamped to [`MIN_PART_SIZE`]. The result partitions
/// `[0, file_size)` contiguously; every part except possibly the last has
/// the effective part size, the last one takes the remainder.
///
/// Pure and deterministic: the same inputs always yield the same plan, which
/// is what lets a resumed upload match its persisted parts.
pub fn plan_parts(file_size: u64, part_size: u64) -> UploadResult<Vec<PartInfo>> {
    if file_size == 0 {
        return Err(UploadException::EmptyFile);
    }
    let part_size = part_size.max(MIN_PART_SIZE);
    let parts_count = (file_size + part_size - 1) / part_size;
    if parts_count > MAX_PARTS {
        return Err(UploadException::TooManyParts {
            parts: parts_count,
            max: MAX_PARTS,
        });
    }
    Ok((1..=parts_count)
        .map(|part_number| {
            let start = (part_number - 1) * part_size;
            let end = (start + part_size).min(file_size);
            PartInfo {
                part_number: part_number as u32,
                start,
                end,
                size: end - start,
                etag: None,
                state: PartState::Pending,
            }
        })
        .collect())
}
