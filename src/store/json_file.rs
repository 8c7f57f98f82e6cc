//! JSON-file-backed record store.
//!
//! The whole report list lives in one JSON array on disk. Appends rewrite
//! the file through a sibling temp file and an atomic rename, so a failed
//! write never truncates existing reports and `append` is all-or-nothing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::engine::report::{NewReport, Report};
use crate::error::SafeWatchError;
use crate::store::{RecordStore, drug_name_matches};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes the read-modify-write cycle across concurrent appends.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Report>, SafeWatchError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(reports) => Ok(reports),
            Err(err) => {
                // An unreadable file is treated as empty rather than wedging
                // every subsequent turn; the next append rewrites it whole.
                warn!(path = %self.path.display(), error = %err, "Report file unreadable, starting empty");
                Ok(Vec::new())
            }
        }
    }

    async fn persist(&self, reports: &[Report]) -> Result<(), SafeWatchError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(reports)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn append(&self, report: NewReport) -> Result<Report, SafeWatchError> {
        let _guard = self.write_lock.lock().await;

        let report = report.into_report();
        let mut reports = self.load().await.map_err(persistence_err)?;
        reports.push(report.clone());
        self.persist(&reports).await.map_err(persistence_err)?;
        Ok(report)
    }

    async fn find_by_drug(&self, name: &str) -> Result<Vec<Report>, SafeWatchError> {
        let reports = self.load().await?;
        Ok(reports
            .into_iter()
            .filter(|r| drug_name_matches(&r.drug_name, name))
            .collect())
    }
}

fn persistence_err(err: SafeWatchError) -> SafeWatchError {
    SafeWatchError::Persistence {
        message: err.to_string(),
    }
}
