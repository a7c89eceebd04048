use std::{collections::HashMap, hash::Hash, marker::PhantomData, path::{Path, PathBuf}};
use tokio::{fs, io::AsyncWriteExt};
use tracing::error;

use crate::errors::ServiceError;

/// A `HashMap<K, V>` persisted as one JSON object in a file.
///
/// Nothing is cached: every `read` decodes the whole file and every `write`
/// replaces it. Writes go to `<path>.tmp` and are renamed over the original,
/// so a reader sees either the old or the new document. Concurrent writers
/// must be serialised by the caller.
#[derive(Debug, Clone)]
pub struct JsonMapFile<K, V> {
    file_path: PathBuf,
    tmp_path: PathBuf,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> JsonMapFile<K, V>
where
    K: Eq + Hash + serde::Serialize + serde::de::DeserializeOwned,
    V: serde::Serialize + serde::de::DeserializeOwned,
{
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let file_path = path.into();
        let tmp_path = sidecar(&file_path, "tmp");
        Self { file_path, tmp_path, _marker: PhantomData }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Create parent directories and an empty `{}` document if the file is missing.
    /// An existing file is never touched, whoever created it.
    pub async fn ensure_exists(&self) -> Result<(), ServiceError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ServiceError::storage("couldn't create data directory", e))?;
            }
        }
        match self.create_empty().await {
            Err(e) if e.kind() != std::io::ErrorKind::AlreadyExists => {
                error!(path = %self.file_path.display(), error = %e, "couldn't write file");
                Err(ServiceError::storage("couldn't write file", e))
            }
            _ => Ok(()),
        }
    }

    async fn create_empty(&self) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&self.file_path).await?;
        file.write_all(b"{}").await?;
        file.sync_all().await
    }

    /// Decode the whole file. A `null` or blank document reads as an empty map.
    pub async fn read(&self) -> Result<HashMap<K, V>, ServiceError> {
        let bytes = fs::read(&self.file_path).await.map_err(|e| {
            error!(path = %self.file_path.display(), error = %e, "couldn't open file");
            ServiceError::storage("couldn't open file", e)
        })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            // created by another process that has not written `{}` yet
            return Ok(HashMap::new());
        }
        let map: Option<HashMap<K, V>> = serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = %self.file_path.display(), error = %e, "couldn't decode json");
            ServiceError::storage("couldn't decode json", e)
        })?;
        Ok(map.unwrap_or_default())
    }

    /// Replace the file with the encoded map.
    pub async fn write(&self, map: &HashMap<K, V>) -> Result<(), ServiceError> {
        let data = serde_json::to_vec(map).map_err(|e| ServiceError::storage("couldn't encode json", e))?;
        self.write_bytes(&data).await.map_err(|e| {
            error!(path = %self.file_path.display(), error = %e, "couldn't write file");
            ServiceError::storage("couldn't write file", e)
        })
    }

    async fn write_bytes(&self, data: &[u8]) -> std::io::Result<()> {
        let mut tmp = fs::File::create(&self.tmp_path).await?;
        tmp.write_all(data).await?;
        tmp.sync_all().await?;
        drop(tmp);
        fs::rename(&self.tmp_path, &self.file_path).await
    }
}

/// `<path>.<suffix>`, keeping the full original file name.
pub(crate) fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn tmp_file(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("json_map_file_{tag}_{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn sidecar_appends_suffix() {
        assert_eq!(sidecar(Path::new("/data/targets.json"), "lock"), PathBuf::from("/data/targets.json.lock"));
    }

    #[tokio::test]
    async fn read_decodes_map_and_null() -> Result<(), anyhow::Error> {
        let ok = tmp_file("ok");
        fs::write(&ok, b"{}").await?;
        let store = JsonMapFile::<String, String>::new(&ok);
        assert!(store.read().await?.is_empty());

        fs::write(&ok, b"null").await?;
        assert!(store.read().await?.is_empty());

        let _ = fs::remove_file(&ok).await;
        Ok(())
    }

    #[tokio::test]
    async fn read_fails_on_missing_or_garbage() -> Result<(), anyhow::Error> {
        let missing = JsonMapFile::<String, String>::new(tmp_file("missing"));
        let err = missing.read().await.err().expect("missing file");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("couldn't open file"));

        let wrong = tmp_file("wrong");
        fs::write(&wrong, b"----").await?;
        let err = JsonMapFile::<String, String>::new(&wrong).read().await.err().expect("bad json");
        assert!(err.to_string().contains("couldn't decode json"));

        let _ = fs::remove_file(&wrong).await;
        Ok(())
    }

    #[tokio::test]
    async fn write_replaces_and_leaves_no_tmp() -> Result<(), anyhow::Error> {
        let path = tmp_file("write");
        let store = JsonMapFile::<String, String>::new(&path);
        store.ensure_exists().await?;

        let mut map = HashMap::new();
        map.insert("a".to_string(), "1".to_string());
        store.write(&map).await?;
        assert_eq!(store.read().await?, map);
        assert!(fs::metadata(sidecar(&path, "tmp")).await.is_err());

        let _ = fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let path = std::env::temp_dir().join(format!("dir_not_exist_{}", uuid::Uuid::new_v4())).join("wrong.json");
        let store = JsonMapFile::<String, String>::new(path);
        let err = store.write(&HashMap::new()).await.err().expect("no such dir");
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn ensure_exists_creates_parents_and_keeps_content() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("json_map_file_dir_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("targets.json");
        let store = JsonMapFile::<String, String>::new(&path);
        store.ensure_exists().await?;
        assert_eq!(fs::read(&path).await?, b"{}");

        fs::write(&path, br#"{"a":"1"}"#).await?;
        store.ensure_exists().await?;
        assert_eq!(store.read().await?.len(), 1);

        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn ensure_exists_never_truncates_existing_file() -> Result<(), anyhow::Error> {
        let path = tmp_file("racing");
        let first = JsonMapFile::<String, String>::new(&path);
        let second = JsonMapFile::<String, String>::new(&path);
        first.ensure_exists().await?;

        let mut map = HashMap::new();
        map.insert("web1".to_string(), "node".to_string());
        first.write(&map).await?;

        // a late starter that missed the file's creation must not reset it
        second.ensure_exists().await?;
        assert_eq!(second.read().await?, map);

        let _ = fs::remove_file(&path).await;
        Ok(())
    }

    #[tokio::test]
    async fn blank_file_reads_as_empty_map() -> Result<(), anyhow::Error> {
        let path = tmp_file("blank");
        fs::write(&path, b"").await?;
        let store = JsonMapFile::<String, String>::new(&path);
        assert!(store.read().await?.is_empty());

        store.ensure_exists().await?;
        assert_eq!(fs::read(&path).await?, b"");

        let _ = fs::remove_file(&path).await;
        Ok(())
    }
}
