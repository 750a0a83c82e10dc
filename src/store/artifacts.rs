//! The artifact naming registry: one directory, one file per logical dataset,
//! and no write ever replacing an existing file.
//!
//! Content is written to a temporary file in the target directory first and then
//! moved into place with a no-clobber rename, so a failed or refused write leaves
//! nothing behind and a concurrent writer can never be overwritten silently.

use crate::config::{CollisionPolicy, PipelineConfig};
use crate::prompt::{check_cancelled, Prompt, RetryPolicy};
use crate::store::error::StoreError;
use crate::utils::{create_run_dir, ensure_dir_exists};
use log::{info, warn};
use polars::prelude::*;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

pub const CSV: &str = "csv";
pub const PNG: &str = "png";

const SUFFIX_LIMIT: u32 = 10_000;
const WHAT: &str = "a free artifact name";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    collision: CollisionPolicy,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ArtifactStore {
    pub fn new(
        dir: impl Into<PathBuf>,
        collision: CollisionPolicy,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir_exists(&dir).map_err(|e| StoreError::DirCreation(dir.clone(), e))?;
        Ok(Self {
            dir,
            collision,
            retry,
            cancel,
        })
    }

    /// Opens the configured artifact directory, or a fresh run directory below it
    /// when `per_run_directory` is set.
    pub fn from_config(
        config: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<Self, StoreError> {
        let dir = if config.per_run_directory {
            create_run_dir(&config.artifact_dir)
                .map_err(|e| StoreError::DirCreation(config.artifact_dir.clone(), e))?
        } else {
            config.artifact_dir.clone()
        };
        Self::new(dir, config.collision, config.retry, cancel)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{name}.{ext}"))
    }

    pub fn exists(&self, name: &str, ext: &str) -> bool {
        self.path_for(name, ext).exists()
    }

    /// Picks a name for a new artifact according to the collision policy.
    pub fn claim_name(
        &self,
        name: &str,
        ext: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<String, StoreError> {
        let requested = validate_name(name, ext).map_err(|reason| StoreError::InvalidName {
            name: name.to_string(),
            reason,
        })?;
        if !self.exists(&requested, ext) {
            return Ok(requested);
        }

        match self.collision {
            CollisionPolicy::Fail => Err(StoreError::NamingCollision {
                name: requested,
                dir: self.dir.clone(),
            }),
            CollisionPolicy::Suffix => (1..=SUFFIX_LIMIT)
                .map(|n| format!("{requested}-{n}"))
                .find(|candidate| !self.exists(candidate, ext))
                .ok_or_else(|| StoreError::NamingCollision {
                    name: requested.clone(),
                    dir: self.dir.clone(),
                }),
            CollisionPolicy::Prompt => {
                let mut candidate = requested;
                for attempt in self.retry.attempts() {
                    check_cancelled(&self.cancel, WHAT)?;
                    prompt.say(&format!(
                        ">>> Try again, file exists: {}",
                        self.path_for(&candidate, ext).display()
                    ));
                    let answer = prompt.ask(&format!("<<< Enter a new name for the {ext} file: "))?;
                    match validate_name(&answer, ext) {
                        Ok(name) => candidate = name,
                        Err(reason) => {
                            prompt.say(&format!(">>> {reason}"));
                            continue;
                        }
                    }
                    info!("File naming attempt {attempt}: {candidate}");
                    if !self.exists(&candidate, ext) {
                        return Ok(candidate);
                    }
                }
                Err(StoreError::Naming(self.retry.exhausted(WHAT)))
            }
        }
    }

    /// Writes a new artifact and returns the name it ended up under.
    ///
    /// `fill` writes the content into a temporary file; nothing is visible under the
    /// final name unless it succeeds.
    pub fn write_new(
        &self,
        name: &str,
        ext: &str,
        prompt: &mut dyn Prompt,
        fill: impl FnOnce(&mut File) -> Result<(), StoreError>,
    ) -> Result<String, StoreError> {
        let name = self.claim_name(name, ext, prompt)?;

        let mut tmp =
            NamedTempFile::new_in(&self.dir).map_err(|e| StoreError::Io(self.dir.clone(), e))?;
        fill(tmp.as_file_mut())?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| StoreError::Io(tmp.path().to_path_buf(), e))?;
        self.commit(tmp, name, ext, prompt)
    }

    /// Like [`ArtifactStore::write_new`] for writers that want a path rather than a
    /// file handle. The temporary path carries the `.{ext}` extension.
    pub fn write_new_at<E: From<StoreError>>(
        &self,
        name: &str,
        ext: &str,
        prompt: &mut dyn Prompt,
        render: impl FnOnce(&Path) -> Result<(), E>,
    ) -> Result<String, E> {
        let name = self.claim_name(name, ext, prompt)?;

        let tmp = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile_in(&self.dir)
            .map_err(|e| StoreError::Io(self.dir.clone(), e))?;
        render(tmp.path())?;
        Ok(self.commit(tmp, name, ext, prompt)?)
    }

    /// Moves `tmp` into place without replacing anything, re-claiming a name if
    /// another file appeared under it in the meantime.
    fn commit(
        &self,
        mut tmp: NamedTempFile,
        mut name: String,
        ext: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<String, StoreError> {
        for _ in self.retry.attempts() {
            let path = self.path_for(&name, ext);
            match tmp.persist_noclobber(&path) {
                Ok(_) => {
                    info!("File was created: {}", path.display());
                    return Ok(name);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    warn!("{} appeared while writing, picking another name", path.display());
                    tmp = e.file;
                    name = self.claim_name(&name, ext, prompt)?;
                }
                Err(e) => return Err(StoreError::Io(path, e.error)),
            }
        }
        Err(StoreError::NamingCollision {
            name,
            dir: self.dir.clone(),
        })
    }

    /// Writes `df` as a comma-separated file with a header row.
    pub fn write_csv(
        &self,
        name: &str,
        df: &mut DataFrame,
        prompt: &mut dyn Prompt,
    ) -> Result<String, StoreError> {
        let dir = self.dir.clone();
        self.write_new(name, CSV, prompt, |file| {
            CsvWriter::new(file)
                .include_header(true)
                .with_separator(b',')
                .finish(df)
                .map_err(|e| StoreError::CsvWrite(dir, e))
        })
    }

    /// Reads a CSV artifact with every column as a string.
    pub fn read_csv(&self, name: &str) -> Result<DataFrame, StoreError> {
        let path = self.path_for(name, CSV);
        if !path.is_file() {
            return Err(StoreError::Io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "artifact not found"),
            ));
        }
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.clone()))
            .map_err(|e| StoreError::CsvRead(path.clone(), e))?
            .finish()
            .map_err(|e| StoreError::CsvRead(path, e))
    }
}

/// Strips an `.{ext}` suffix and rejects names that would escape the directory.
fn validate_name(raw: &str, ext: &str) -> Result<String, &'static str> {
    let trimmed = raw.trim();
    let name = trimmed
        .strip_suffix(&format!(".{ext}"))
        .unwrap_or(trimmed)
        .trim();
    if name.is_empty() {
        return Err("The name is empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err("The name must not contain path separators");
    }
    Ok(name.to_string())
}
