/// Run directories and JSON artifacts
///
/// Each job run gets its own directory under the runs root. Jobs write their
/// diagnostic JSON there as they go; the caller closes the run with a
/// `run.json` record once the job outcome is known.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Name of the run record written into every run directory
pub const RUN_RECORD_FILE: &str = "run.json";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Writes pretty-printed JSON files into one directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize `value` to `<dir>/<name>`, replacing any previous file
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.dir.join(name);

        let body = serde_json::to_string_pretty(value).map_err(|source| {
            ArtifactError::Serialize {
                path: path.clone(),
                source,
            }
        })?;

        fs::write(&path, body).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Contents of `run.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: Uuid,
    pub job: String,
    pub status: RunStatus,
    pub no_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One job run and its directory
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    job: String,
    run_dir: PathBuf,
    started_at: DateTime<Utc>,
}

impl RunContext {
    /// Create `<runs_dir>/<timestamp>_<job>/`
    pub fn create(runs_dir: impl AsRef<Path>, job: &str) -> Result<Self, ArtifactError> {
        let started_at = Utc::now();
        let run_dir = runs_dir
            .as_ref()
            .join(format!("{}_{}", run_timestamp(&started_at), job));

        fs::create_dir_all(&run_dir).map_err(|source| ArtifactError::Io {
            path: run_dir.clone(),
            source,
        })?;

        Ok(Self {
            run_id: Uuid::new_v4(),
            job: job.to_string(),
            run_dir,
            started_at,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Writer scoped to this run's directory
    pub fn artifacts(&self) -> ArtifactWriter {
        ArtifactWriter::new(&self.run_dir)
    }

    /// Close the run by writing `run.json`
    pub fn finish(
        &self,
        status: RunStatus,
        no_retry: bool,
        error: Option<String>,
    ) -> Result<RunRecord, ArtifactError> {
        let record = RunRecord {
            run_id: self.run_id,
            job: self.job.clone(),
            status,
            no_retry,
            error,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };

        self.artifacts().write_json(RUN_RECORD_FILE, &record)?;
        Ok(record)
    }
}

/// Sortable directory-name timestamp: `YYYY-MM-DD_HH-MM-SS`
pub fn run_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d_%H-%M-%S").to_string()
}
