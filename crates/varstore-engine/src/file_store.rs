//! JSON-file backed store.
//!
//! Each store lives at `<root>/<namespace>/<name>.json`. Both path components
//! must be RFC 1123 labels, so a name can never step outside the root. The
//! file's location is its identity: metadata read from the body is replaced
//! by the namespace and name the file was found under.
//!
//! Writes replace the file by writing a sibling temp file and renaming it over
//! the original, so readers never see a half-written document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use varstore_types::{VarStoreError, VariableStore};

use crate::client::VariableStoreClient;

const MAX_LABEL_LEN: usize = 63;

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    // Serializes read-check-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, namespace: &str, name: &str) -> varstore_types::Result<PathBuf> {
        check_label("namespace", namespace)?;
        check_label("name", name)?;
        Ok(self.root.join(namespace).join(format!("{name}.json")))
    }

    /// Create or overwrite a store without a version check.
    ///
    /// Overwriting an existing file moves its resource version forward, so an
    /// update that read the old document still conflicts. An existing file that
    /// cannot be read is an error rather than being silently replaced.
    pub async fn put(&self, store: &VariableStore) -> varstore_types::Result<VariableStore> {
        let _guard = self.write_lock.lock().await;
        let namespace = store.metadata.namespace.as_str();
        let name = store.metadata.name.as_str();

        let mut written = store.clone();
        match self.read(namespace, name).await {
            Ok(current) => {
                written.metadata.resource_version = current.metadata.resource_version + 1;
            }
            Err(VarStoreError::StoreNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        write_atomic(&self.path_for(namespace, name)?, &written).await?;
        Ok(written)
    }

    async fn read(&self, namespace: &str, name: &str) -> varstore_types::Result<VariableStore> {
        let path = self.path_for(namespace, name)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(VarStoreError::StoreNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        let json = tokio::fs::read_to_string(&path).await?;
        let mut store: VariableStore = serde_json::from_str(&json)?;
        store.metadata.namespace = namespace.to_string();
        store.metadata.name = name.to_string();
        Ok(store)
    }
}

/// Lowercase alphanumerics and `-`, starting and ending alphanumeric.
fn check_label(field: &'static str, value: &str) -> varstore_types::Result<()> {
    let bytes = value.as_bytes();
    let alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let valid = !bytes.is_empty()
        && bytes.len() <= MAX_LABEL_LEN
        && bytes.iter().all(|b| alnum(b) || *b == b'-')
        && bytes.first().is_some_and(alnum)
        && bytes.last().is_some_and(alnum);
    if valid {
        Ok(())
    } else {
        Err(VarStoreError::InvalidName {
            field,
            value: value.to_string(),
        })
    }
}

async fn write_atomic(path: &Path, store: &VariableStore) -> varstore_types::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(store)?;
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::debug!(path = %path.display(), "VariableStore written");
    Ok(())
}

#[async_trait]
impl VariableStoreClient for FileStore {
    async fn get(&self, namespace: &str, name: &str) -> varstore_types::Result<VariableStore> {
        self.read(namespace, name).await
    }

    async fn update(&self, mut store: VariableStore) -> varstore_types::Result<VariableStore> {
        let _guard = self.write_lock.lock().await;
        let namespace = store.metadata.namespace.clone();
        let name = store.metadata.name.clone();

        let current = self.read(&namespace, &name).await?;
        if current.metadata.resource_version != store.metadata.resource_version {
            return Err(VarStoreError::Conflict {
                namespace,
                name,
                expected: store.metadata.resource_version,
                found: current.metadata.resource_version,
            });
        }

        store.metadata.resource_version += 1;
        write_atomic(&self.path_for(&namespace, &name)?, &store).await?;
        Ok(store)
    }
}
