use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use dashboard_core::JobId;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Durable key holding the current job id across restarts.
pub const CURRENT_JOB_KEY: &str = "current_etl_job_id";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("stored value {0:?} is not a job id")]
    Corrupt(String),
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Storage for the current job handle.
pub trait JobStore: Send {
    fn load(&self) -> Result<Option<JobId>, PersistError>;
    fn save(&self, job_id: JobId) -> Result<(), PersistError>;
    fn clear(&self) -> Result<(), PersistError>;
}

/// Keeps the job id as a decimal string in `{dir}/current_etl_job_id`.
pub struct FileJobStore {
    writer: AtomicFileWriter,
}

impl FileJobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    fn path(&self) -> PathBuf {
        self.writer.dir().join(CURRENT_JOB_KEY)
    }
}

impl JobStore for FileJobStore {
    fn load(&self) -> Result<Option<JobId>, PersistError> {
        let raw = match fs::read_to_string(self.path()) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<JobId>()
            .map(Some)
            .map_err(|_| PersistError::Corrupt(trimmed.to_string()))
    }

    fn save(&self, job_id: JobId) -> Result<(), PersistError> {
        self.writer.write(CURRENT_JOB_KEY, &job_id.to_string())?;
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistError> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
