use std::sync::Arc;
use std::time::Duration;

use ::redis::{Client, Cmd};
use async_trait::async_trait;
use dashmap::DashMap;
use domain_upload::model::entity::{PartState, UploadStatus};
use domain_upload::repository::UploadStateRepo;
use tokio::sync::Mutex;

/// Redis-backed state store. Progress survives process restarts, so an
/// interrupted upload can be picked up again later.
///
/// Read-modify-write updates are serialized per key through in-process
/// guards; a storage key is expected to be driven by a single uploader at a
/// time.
pub struct RedisStateRepo {
    client: Client,
    ttl_ms: u64,
    key_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl RedisStateRepo {
    pub fn new(url: &str, ttl: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::open(url)?,
            ttl_ms: ttl.as_millis() as u64,
            key_guards: DashMap::new(),
        })
    }

    fn guard_of(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_guards.entry(key.to_owned()).or_default().clone()
    }

    fn read(&self, key: &str) -> anyhow::Result<Option<UploadStatus>> {
        let mut connection = self.client.get_connection()?;
        let json: Option<String> = Cmd::get(key).query(&mut connection)?;
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    fn write(&self, key: &str, status: &UploadStatus) -> anyhow::Result<()> {
        let mut connection = self.client.get_connection()?;
        Cmd::pset_ex(key, serde_json::to_string(status)?, self.ttl_ms)
            .query::<()>(&mut connection)?;
        Ok(())
    }
}

#[async_trait]
impl UploadStateRepo for RedisStateRepo {
    async fn save_status(&self, key: &str, status: &UploadStatus) -> anyhow::Result<()> {
        let guard = self.guard_of(key);
        let _locked = guard.lock().await;
        self.write(key, status)
    }

    async fn get_status(&self, key: &str) -> anyhow::Result<Option<UploadStatus>> {
        self.read(key)
    }

    async fn delete_status(&self, key: &str) -> anyhow::Result<bool> {
        let guard = self.guard_of(key);
        let _locked = guard.lock().await;
        let mut connection = self.client.get_connection()?;
        let removed: i64 = Cmd::del(key).query(&mut connection)?;
        drop(_locked);
        // Drop the guard only while no other task holds a clone of it (two
        // counts: the map's and ours); otherwise a later `guard_of` would
        // mint a second mutex for a key that is still being serialized.
        self.key_guards
            .remove_if(key, |_, candidate| Arc::strong_count(candidate) == 2);
        Ok(removed > 0)
    }

    async fn update_part_status(
        &self,
        key: &str,
        part_number: u32,
        state: PartState,
        etag: Option<String>,
    ) -> anyhow::Result<bool> {
        let guard = self.guard_of(key);
        let _locked = guard.lock().await;
        match self.read(key)? {
            Some(mut status) => {
                status.apply_part_update(part_number, state, etag.as_deref());
                self.write(key, &status)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_uploaded_size(&self, key: &str, uploaded_size: u64) -> anyhow::Result<bool> {
        let guard = self.guard_of(key);
        let _locked = guard.lock().await;
        match self.read(key)? {
            Some(mut status) => {
                status.apply_uploaded_size(uploaded_size);
                self.write(key, &status)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
