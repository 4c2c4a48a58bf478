use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::Mutex;

use fancontrol_common::{ContactBackend, ContactRecord, RuntimeConfig};

/// JSON files under the data directory. One lock serializes all file access.
#[derive(Clone)]
pub struct AppStore {
    runtime_path: Arc<PathBuf>,
    contacts_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl AppStore {
    pub fn new() -> Self {
        let data_dir = std::env::var("FANCONTROL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.fancontrol"));
        Self::in_dir(data_dir)
    }

    pub fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            contacts_path: Arc::new(data_dir.join("contacts.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        write_json(self.runtime_path.as_ref(), runtime).await
    }

    pub async fn load_contacts(&self) -> anyhow::Result<Vec<ContactRecord>> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.contacts_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<Vec<ContactRecord>>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Snapshots the backend under the store lock, so the last write always
    /// carries every record accepted before it.
    pub async fn save_contacts_from<B: ContactBackend + ?Sized>(
        &self,
        backend: &B,
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let records = backend
            .list()
            .map_err(|err| anyhow::anyhow!("contact store unavailable: {err}"))?;
        write_json(self.contacts_path.as_ref(), &records).await
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

async fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, payload).await?;
    Ok(())
}
