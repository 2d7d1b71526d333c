//! Filesystem document store.
//!
//! Layout: `<root>/<bucket>/<Account>/<Account> - Call Brief.md`.

use std::sync::Arc;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use callbrief_gateway_api::document::{append_record, contains_record, upsert_section};
use callbrief_gateway_api::{GatewayError, StorageLocation, StoreGateway, normalize_name};
use callbrief_utils::atomic_write::{read_document, write_file_atomic};

use crate::layout::{bucket_for, document_name, folder_name_for};

#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: Utf8PathBuf,
    /// Serializes read-modify-write cycles so concurrent appends cannot
    /// overwrite each other.
    write_lock: Arc<Mutex<()>>,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Misconfiguration` when the path is not UTF-8.
    pub fn from_path(root: std::path::PathBuf) -> Result<Self, GatewayError> {
        Utf8PathBuf::from_path_buf(root)
            .map(Self::new)
            .map_err(|p| {
                GatewayError::Misconfiguration(format!(
                    "store root is not valid UTF-8: {}",
                    p.display()
                ))
            })
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn document_path(location: &StorageLocation) -> Utf8PathBuf {
        Utf8PathBuf::from(&location.reference)
    }

    /// Apply `edit` to the current document and write the result if it
    /// returns `Some`. Returns whether a write happened.
    async fn modify<F>(&self, location: &StorageLocation, edit: F) -> Result<bool, GatewayError>
    where
        F: FnOnce(&str) -> Option<String> + Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = Self::document_path(location);

        run_blocking(move || {
            let current = read_document(&path)
                .map_err(|e| GatewayError::Io(e.to_string()))?
                .unwrap_or_default();
            match edit(&current) {
                Some(updated) => {
                    write_file_atomic(&path, &updated).map_err(|e| GatewayError::Io(format!("{e:#}")))?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, GatewayError>
where
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GatewayError::Io(format!("store task failed: {e}")))?
}

/// Names of the sub-directories of `dir`; empty when `dir` does not exist.
fn list_folders(dir: &Utf8Path) -> Result<Vec<String>, GatewayError> {
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string());
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl StoreGateway for FsDocumentStore {
    async fn candidates(&self, account: &str) -> Result<Vec<String>, GatewayError> {
        let dir = self.root.join(bucket_for(account));
        run_blocking(move || list_folders(&dir)).await
    }

    async fn resolve_or_create(&self, account: &str) -> Result<StorageLocation, GatewayError> {
        let key = normalize_name(account);
        let new_folder = folder_name_for(account)?;
        let bucket_dir = self.root.join(bucket_for(&new_folder));
        let _guard = self.write_lock.lock().await;

        let account = account.to_string();
        run_blocking(move || {
            let existing = list_folders(&bucket_dir)?
                .into_iter()
                .find(|name| normalize_name(name) == key);

            let folder = match existing {
                Some(name) => {
                    debug!(account = %account, folder = %name, "Reusing account folder");
                    name
                }
                None => {
                    std::fs::create_dir_all(bucket_dir.join(&new_folder))?;
                    info!(account = %account, folder = %new_folder, "Created account folder");
                    new_folder
                }
            };

            let reference = bucket_dir.join(&folder).join(document_name(&folder));
            Ok(StorageLocation {
                account: folder,
                key,
                reference: reference.into_string(),
            })
        })
        .await
    }

    async fn read(&self, location: &StorageLocation) -> Result<String, GatewayError> {
        let path = Self::document_path(location);
        run_blocking(move || {
            read_document(&path)
                .map(Option::unwrap_or_default)
                .map_err(|e| GatewayError::Io(format!("{e:#}")))
        })
        .await
    }

    async fn append_if_absent(
        &self,
        location: &StorageLocation,
        record_key: &str,
        record_text: &str,
    ) -> Result<bool, GatewayError> {
        let key = record_key.to_string();
        let record = record_text.to_string();
        self.modify(location, move |doc| {
            (!contains_record(doc, &key)).then(|| append_record(doc, &record))
        })
        .await
    }

    async fn replace_section(
        &self,
        location: &StorageLocation,
        section_key: &str,
        new_text: &str,
    ) -> Result<(), GatewayError> {
        let key = section_key.to_string();
        let body = new_text.to_string();
        self.modify(location, move |doc| Some(upsert_section(doc, &key, &body)))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbrief_gateway_api::document::{BRIEF_SECTION, count_sections, parse_records, render_record};
    use callbrief_gateway_api::ItemSummary;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn store() -> (TempDir, FsDocumentStore) {
        let dir = TempDir::new().unwrap();
        let store = FsDocumentStore::from_path(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn record(id: &str, day: u32) -> String {
        render_record(&ItemSummary {
            item_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 10, 0, 0).unwrap(),
            title: format!("Call {id}"),
            participants: vec!["Jane Roe".into()],
            body: "Discussed rollout.".into(),
        })
    }

    #[tokio::test]
    async fn test_resolve_creates_bucketed_folder_once() {
        let (_dir, store) = store();

        let first = store.resolve_or_create("foo inc").await.unwrap();
        let again = store.resolve_or_create("Foo Inc.").await.unwrap();

        assert_eq!(first, again);
        assert_eq!(first.account, "Foo inc");
        assert!(first.reference.ends_with("F/Foo inc/Foo inc - Call Brief.md"));
        assert_eq!(store.candidates("Foo").await.unwrap(), vec!["Foo inc"]);
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_folder_spelling() {
        let (dir, store) = store();
        std::fs::create_dir_all(dir.path().join("A/Acme.io")).unwrap();

        let location = store.resolve_or_create("acme io").await.unwrap();

        assert_eq!(location.account, "Acme.io");
        assert_eq!(store.candidates("acme").await.unwrap(), vec!["Acme.io"]);
    }

    #[tokio::test]
    async fn test_read_missing_document_is_empty() {
        let (_dir, store) = store();
        let location = store.resolve_or_create("Globex").await.unwrap();
        assert_eq!(store.read(&location).await.unwrap(), "");
        assert!(store.candidates("Zed").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_if_absent_is_idempotent() {
        let (_dir, store) = store();
        let location = store.resolve_or_create("Foo Inc").await.unwrap();

        assert!(store.append_if_absent(&location, "1", &record("1", 1)).await.unwrap());
        assert!(!store.append_if_absent(&location, "1", &record("1", 1)).await.unwrap());
        assert!(store.append_if_absent(&location, "2", &record("2", 2)).await.unwrap());

        let doc = store.read(&location).await.unwrap();
        let scan = parse_records(&doc);
        assert_eq!(scan.records.len(), 2);
        assert!(scan.malformed.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let (_dir, store) = store();
        let location = store.resolve_or_create("Foo Inc").await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for i in 1..=8u32 {
            let store = store.clone();
            let location = location.clone();
            tasks.spawn(async move {
                let id = i.to_string();
                store.append_if_absent(&location, &id, &record(&id, i)).await
            });
        }
        while let Some(res) = tasks.join_next().await {
            assert!(res.unwrap().unwrap());
        }

        let doc = store.read(&location).await.unwrap();
        assert_eq!(parse_records(&doc).records.len(), 8);
    }

    #[tokio::test]
    async fn test_replace_section_keeps_single_header() {
        let (_dir, store) = store();
        let location = store.resolve_or_create("Foo Inc").await.unwrap();
        store.append_if_absent(&location, "1", &record("1", 1)).await.unwrap();

        store.replace_section(&location, BRIEF_SECTION, "first").await.unwrap();
        store.replace_section(&location, BRIEF_SECTION, "second").await.unwrap();

        let doc = store.read(&location).await.unwrap();
        assert_eq!(count_sections(&doc, BRIEF_SECTION), 1);
        assert!(doc.contains("second"));
        assert!(!doc.contains("first"));
        assert_eq!(parse_records(&doc).records.len(), 1);
    }
}
