use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domain_upload::model::entity::{PartState, UploadStatus};
use domain_upload::repository::UploadStateRepo;

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// In-memory state store with a per-entry time-to-live and a bounded
/// capacity.
///
/// An entry's TTL is refreshed on every write and checked lazily on access.
/// When the store is full, the entry closest to expiry is evicted. Per-key
/// read-modify-write updates are atomic: the underlying map holds the shard
/// lock while an entry is modified in place.
pub struct MemStateRepo {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

struct CacheEntry {
    status: UploadStatus,
    expires_at: Instant,
}

impl MemStateRepo {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look an upload up by its remote upload id instead of the storage key.
    pub fn get_status_by_upload_id(&self, upload_id: &str) -> Option<UploadStatus> {
        let now = Instant::now();
        self.entries
            .iter()
            .find(|entry| entry.expires_at > now && entry.status.upload_id == upload_id)
            .map(|entry| entry.status.clone())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expiry(&self) -> Instant {
        Instant::now() + self.ttl
    }

    /// Drop entries closest to expiry until the capacity holds again,
    /// keeping the key that was just written. Runs after the insert, so
    /// concurrent saves may overshoot the capacity briefly but every save
    /// trims the map back down.
    fn trim_to_capacity(&self, keep: &str) {
        while self.entries.len() > self.capacity {
            let closest = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .min_by_key(|entry| entry.expires_at)
                .map(|entry| entry.key().clone());
            match closest {
                Some(closest) => {
                    self.entries.remove(&closest);
                }
                None => break,
            }
        }
    }

    fn update_with(&self, key: &str, update: impl FnOnce(&mut UploadStatus)) -> bool {
        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return false;
            };
            if entry.expires_at > Instant::now() {
                update(&mut entry.status);
                entry.expires_at = Instant::now() + self.ttl;
                return true;
            }
        }
        // Expired; the guard is released before removal.
        self.entries.remove(key);
        false
    }
}

impl Default for MemStateRepo {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[async_trait]
impl UploadStateRepo for MemStateRepo {
    async fn save_status(&self, key: &str, status: &UploadStatus) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                status: status.clone(),
                expires_at: self.expiry(),
            },
        );
        self.trim_to_capacity(key);
        Ok(())
    }

    async fn get_status(&self, key: &str) -> anyhow::Result<Option<UploadStatus>> {
        {
            let Some(entry) = self.entries.get(key) else {
                return Ok(None);
            };
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.status.clone()));
            }
        }
        self.entries.remove(key);
        Ok(None)
    }

    async fn delete_status(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn update_part_status(
        &self,
        key: &str,
        part_number: u32,
        state: PartState,
        etag: Option<String>,
    ) -> anyhow::Result<bool> {
        Ok(self.update_with(key, |status| {
            status.apply_part_update(part_number, state, etag.as_deref());
        }))
    }

    async fn update_uploaded_size(&self, key: &str, uploaded_size: u64) -> anyhow::Result<bool> {
        Ok(self.update_with(key, |status| {
            status.apply_uploaded_size(uploaded_size);
        }))
    }
}
