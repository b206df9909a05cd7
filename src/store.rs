use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, RwLock};

/// Flat key/value record, the unit the host store reads and writes.
pub type Record = serde_json::Map<String, Value>;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// Persistence façade provided by the host.
///
/// `subscribe` stands in for an on-change listener: every `set` that actually
/// changes a key produces one `StoreChange` per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, keys: &[&str]) -> AppResult<Record>;
    async fn set(&self, record: Record) -> AppResult<()>;
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Turn a `json!({...})` literal into a record. Non-objects become empty.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

fn select(source: &Record, keys: &[&str]) -> Record {
    keys.iter()
        .filter_map(|k| source.get(*k).map(|v| (k.to_string(), v.clone())))
        .collect()
}

fn merge(target: &mut Record, update: Record) -> Vec<StoreChange> {
    let mut changes = Vec::new();
    for (key, new_value) in update {
        let old_value = target.get(&key).cloned();
        if old_value.as_ref() == Some(&new_value) {
            continue;
        }
        target.insert(key.clone(), new_value.clone());
        changes.push(StoreChange {
            key,
            old_value,
            new_value,
        });
    }
    changes
}

fn notify(sender: &broadcast::Sender<StoreChange>, changes: Vec<StoreChange>) {
    for change in changes {
        // No subscribers is fine
        let _ = sender.send(change);
    }
}

pub struct MemoryStore {
    data: RwLock<Record>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            data: RwLock::new(Record::new()),
            changes,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> AppResult<Record> {
        Ok(select(&*self.data.read().await, keys))
    }

    async fn set(&self, record: Record) -> AppResult<()> {
        let changes = merge(&mut *self.data.write().await, record);
        notify(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// File-backed store. The whole record is rewritten as pretty JSON on
/// every `set`, mirroring how the app config is saved.
pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<Record>,
    changes: broadcast::Sender<StoreChange>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<Value>(&content)? {
                Value::Object(map) => map,
                _ => {
                    return Err(AppError::Store(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
            }
        } else {
            Record::new()
        };
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            data: RwLock::new(data),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> AppResult<Record> {
        Ok(select(&*self.data.read().await, keys))
    }

    async fn set(&self, record: Record) -> AppResult<()> {
        let mut data = self.data.write().await;
        let changes = merge(&mut data, record);
        if changes.is_empty() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let content = serde_json::to_string_pretty(&*data)?;
        tokio::fs::write(&self.path, content).await?;
        drop(data);

        notify(&self.changes, changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
