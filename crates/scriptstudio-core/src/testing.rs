//! In-memory remote backend for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::{Collection, Fields, Record, RecordId, SortSpec};
use crate::remote::{RemoteApi, RemoteError, RemoteResult};
use crate::util::now_millis;

type Key = (Collection, RecordId);

/// Scriptable [`RemoteApi`]: can fail, hang, delay creates, lose create
/// acknowledgements, or issue its own ids.
#[derive(Default)]
pub struct ScriptedRemote {
    records: Mutex<BTreeMap<Key, Value>>,
    failing: AtomicBool,
    hanging: AtomicBool,
    rekey_creates: AtomicBool,
    lose_create_acks: AtomicBool,
    create_delay_ms: AtomicU64,
    calls: AtomicUsize,
    creates: AtomicUsize,
    next_remote_id: AtomicUsize,
}

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

impl ScriptedRemote {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub fn set_rekey_creates(&self, rekey: bool) {
        self.rekey_creates.store(rekey, Ordering::SeqCst);
    }

    /// Store created records but answer with a timeout.
    pub fn set_losing_create_acks(&self, lose: bool) {
        self.lose_create_acks.store(lose, Ordering::SeqCst);
    }

    pub fn set_create_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.create_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Every call that reached the backend, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Creates that were accepted.
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn contains(&self, collection: Collection, id: &RecordId) -> bool {
        self.stored(collection, id).is_some()
    }

    pub fn stored(&self, collection: Collection, id: &RecordId) -> Option<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&(collection, id.clone()))
            .cloned()
    }

    pub fn count_in(&self, collection: Collection) -> usize {
        self.records
            .lock()
            .unwrap()
            .keys()
            .filter(|(stored, _)| *stored == collection)
            .count()
    }

    /// Insert a record directly, bypassing failure scripting.
    pub fn seed(&self, collection: Collection, value: Value) -> Record {
        let record = Record::from_remote(value.clone(), now_millis()).unwrap();
        self.records
            .lock()
            .unwrap()
            .insert((collection, record.id.clone()), value);
        record
    }

    async fn enter(&self) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "scripted outage".to_string(),
            });
        }
        Ok(())
    }

    fn to_record(value: Value) -> RemoteResult<Record> {
        Record::from_remote(value, now_millis())
            .ok_or_else(|| RemoteError::InvalidPayload("record without id".to_string()))
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn list(&self, collection: Collection, sort: &SortSpec) -> RemoteResult<Vec<Record>> {
        self.enter().await?;
        let values: Vec<Value> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((stored, _), _)| *stored == collection)
            .map(|(_, value)| value.clone())
            .collect();
        let mut records = values
            .into_iter()
            .map(Self::to_record)
            .collect::<RemoteResult<Vec<_>>>()?;
        sort.sort(&mut records);
        Ok(records)
    }

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Record> {
        self.enter().await?;
        let value = self.stored(collection, id).ok_or(RemoteError::NotFound)?;
        Self::to_record(value)
    }

    async fn create(&self, collection: Collection, payload: &Value) -> RemoteResult<Record> {
        self.enter().await?;
        let delay = self.create_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut value = payload.clone();
        if self.rekey_creates.load(Ordering::SeqCst) {
            let next = self.next_remote_id.fetch_add(1, Ordering::SeqCst);
            value["id"] = Value::String(format!("remote-{next}"));
        }
        let record = Self::to_record(value.clone())?;

        let mut records = self.records.lock().unwrap();
        let key = (collection, record.id.clone());
        if records.contains_key(&key) {
            return Err(RemoteError::Conflict);
        }
        records.insert(key, value);
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.lose_create_acks.load(Ordering::SeqCst) {
            return Err(RemoteError::Timeout(Duration::from_millis(delay)));
        }
        Ok(record)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: &Value,
    ) -> RemoteResult<Record> {
        self.enter().await?;
        let mut records = self.records.lock().unwrap();
        let stored = records
            .get_mut(&(collection, id.clone()))
            .ok_or(RemoteError::NotFound)?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *stored, partial) {
            for (key, value) in changes {
                if key != "id" {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Self::to_record(stored.clone())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> RemoteResult<()> {
        self.enter().await?;
        self.records
            .lock()
            .unwrap()
            .remove(&(collection, id.clone()))
            .map(|_| ())
            .ok_or(RemoteError::NotFound)
    }
}
