//! In-memory document store with the same semantics as the filesystem one.

use std::collections::{BTreeMap, btree_map};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use callbrief_gateway_api::document::{append_record, contains_record, upsert_section};
use callbrief_gateway_api::{GatewayError, StorageLocation, StoreGateway, normalize_name};

use crate::layout::{bucket_for, document_name, folder_name_for};

#[derive(Debug, Clone)]
struct Entry {
    folder: String,
    document: String,
}

/// Documents keyed by normalized account name.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    writes: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create an account folder holding `document`.
    #[must_use]
    pub fn with_document(self, folder: &str, document: &str) -> Self {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                normalize_name(folder),
                Entry {
                    folder: folder.to_string(),
                    document: document.to_string(),
                },
            );
        }
        self
    }

    /// Current document for `account`, if its folder exists.
    pub fn document(&self, account: &str) -> Option<String> {
        self.lock()
            .ok()?
            .get(&normalize_name(account))
            .map(|e| e.document.clone())
    }

    /// Number of document writes performed since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Entry>>, GatewayError> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Io("memory store lock poisoned".to_string()))
    }

    fn modify<F>(&self, location: &StorageLocation, edit: F) -> Result<bool, GatewayError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let mut entries = self.lock()?;
        let entry = entries.get_mut(&location.key).ok_or_else(|| {
            GatewayError::Io(format!("no document for account {}", location.account))
        })?;
        match edit(&entry.document) {
            Some(updated) => {
                entry.document = updated;
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl StoreGateway for MemoryDocumentStore {
    async fn candidates(&self, account: &str) -> Result<Vec<String>, GatewayError> {
        let bucket = bucket_for(account);
        Ok(self
            .lock()?
            .values()
            .filter(|e| bucket_for(&e.folder) == bucket)
            .map(|e| e.folder.clone())
            .collect())
    }

    async fn resolve_or_create(&self, account: &str) -> Result<StorageLocation, GatewayError> {
        let key = normalize_name(account);
        let mut entries = self.lock()?;
        let folder = match entries.entry(key.clone()) {
            btree_map::Entry::Occupied(existing) => existing.get().folder.clone(),
            btree_map::Entry::Vacant(slot) => {
                let folder = folder_name_for(account)?;
                slot.insert(Entry {
                    folder: folder.clone(),
                    document: String::new(),
                });
                folder
            }
        };
        Ok(StorageLocation {
            reference: format!("memory:{}/{}", bucket_for(&folder), document_name(&folder)),
            account: folder,
            key,
        })
    }

    async fn read(&self, location: &StorageLocation) -> Result<String, GatewayError> {
        Ok(self
            .lock()?
            .get(&location.key)
            .map(|e| e.document.clone())
            .unwrap_or_default())
    }

    async fn append_if_absent(
        &self,
        location: &StorageLocation,
        record_key: &str,
        record_text: &str,
    ) -> Result<bool, GatewayError> {
        self.modify(location, |doc| {
            (!contains_record(doc, record_key)).then(|| append_record(doc, record_text))
        })
    }

    async fn replace_section(
        &self,
        location: &StorageLocation,
        section_key: &str,
        new_text: &str,
    ) -> Result<(), GatewayError> {
        self.modify(location, |doc| Some(upsert_section(doc, section_key, new_text)))
            .map(|_| ())
    }
}
