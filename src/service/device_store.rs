//! Guest device id persisted in a local JSON file (device.json).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
};
use uuid::Uuid;

/// On-disk shape of the device file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeviceFile {
    device_id: String,
    created_at: DateTime<Utc>,
}

/// Identifies this installation to the guest quota endpoint.
#[derive(Clone)]
pub struct DeviceStore {
    /// Location of the device file on disk.
    path: PathBuf,
}

impl DeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Return the stored id, creating and saving one on first use.
    /// A corrupt or empty file is replaced.
    pub async fn load_or_create(&self) -> Result<String> {
        if let Some(file) = self.load().await? {
            return Ok(file.device_id);
        }
        let file = DeviceFile {
            device_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        self.save(&file).await?;
        tracing::info!("new guest device id written to {}", self.path.display());
        Ok(file.device_id)
    }

    async fn load(&self) -> Result<Option<DeviceFile>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        match serde_json::from_slice::<DeviceFile>(&data) {
            Ok(file) if !file.device_id.trim().is_empty() => Ok(Some(file)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    /// Persist the device file, creating directories if needed.
    async fn save(&self, file: &DeviceFile) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(file)?;
        let out = fs::File::create(&self.path).await?;
        let mut writer = BufWriter::new(out);
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(())
    }
}
