use serde::{Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

// STORAGE MANAGER

/// JSON documents in one directory: `config.json`, `market_overview.json`.
pub struct AsyncStorageManager {
    // Absolute path of the storage directory (e.g. ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// **Constructor: new_relative**
    /// Storage directory relative to the running executable, created if missing.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        // 1. Locate the running executable
        let exe_path = std::env::current_exe()?;
        // 2. Its parent directory plus the relative path (e.g. "storage")
        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    pub async fn new<P: Into<PathBuf>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        // Created once here so `save` never has to check for the folder.
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    /// **Generic Save Function**
    /// Writes `<name>.json` through a temp file and a rename, so readers never
    /// see a half-written document.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", filename);
        let final_path = self.base_dir.join(&file_name);
        // A crash mid-write leaves only the .tmp file damaged.
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        // Pretty-printed so config.json stays hand-editable
        let json_bytes = serde_json::to_vec_pretty(data)?;

        // 1. Write data to the temporary file
        fs::write(&tmp_path, json_bytes).await?;

        // 2. Atomically rename the temp file over the final name
        fs::rename(tmp_path, &final_path).await?;

        info!(path = %final_path.display(), "saved");
        Ok(())
    }

    /// **Generic Load Function**
    /// Reads `<name>.json` and deserializes it into `T`.
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));
        // Raw bytes: serde_json validates UTF-8 while parsing anyway.
        let content = fs::read(path).await?;
        Ok(serde_json::from_slice(&content)?)
    }

    /// Like [`load`](Self::load), but a missing file yields `T::default()`.
    /// A file that exists and fails to parse is still an error.
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        filename: &str,
    ) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));
        match fs::read(&path).await {
            // A corrupt file is surfaced, never silently replaced.
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no file, using defaults");
                Ok(T::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
