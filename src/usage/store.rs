//! Activation log backends.

use crate::error::UsageError;
use crate::usage::Activation;
use chrono::{DateTime, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Append-only storage of [`Activation`] records.
///
/// Records are returned in the order they were appended, oldest first.
pub trait ActivationStore: Send {
  fn append(&mut self, activation: &Activation) -> Result<(), UsageError>;

  fn load(&self) -> Result<Vec<Activation>, UsageError>;

  /// Removes records older than `cutoff`, returning how many were removed.
  fn retain_since(&mut self, cutoff: DateTime<Utc>) -> Result<usize, UsageError>;

  fn clear(&mut self) -> Result<(), UsageError>;
}

/// A volatile store, for tests and frontends without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
  activations: Vec<Activation>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ActivationStore for MemoryStore {
  fn append(&mut self, activation: &Activation) -> Result<(), UsageError> {
    self.activations.push(activation.clone());
    Ok(())
  }

  fn load(&self) -> Result<Vec<Activation>, UsageError> {
    Ok(self.activations.clone())
  }

  fn retain_since(&mut self, cutoff: DateTime<Utc>) -> Result<usize, UsageError> {
    let before = self.activations.len();
    self.activations.retain(|activation| activation.timestamp >= cutoff);
    Ok(before - self.activations.len())
  }

  fn clear(&mut self) -> Result<(), UsageError> {
    self.activations.clear();
    Ok(())
  }
}

/// A durable store keeping one JSON record per line.
///
/// Appends are synced to disk before returning. Pruning rewrites the log
/// through a temporary file that atomically replaces the original.
#[derive(Debug)]
pub struct JsonlStore {
  path: PathBuf,
}

impl JsonlStore {
  /// Opens the log at `path`, creating it and its parent directories.
  ///
  /// # Errors
  ///
  /// Returns [`UsageError::Io`] if the file cannot be created or opened for
  /// appending.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, UsageError> {
    let path = path.into();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|source| io_error(&path, source))?;
    Ok(Self { path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn rewrite(&self, activations: &[Activation]) -> Result<(), UsageError> {
    let temp_path = self.path.with_extension("jsonl.tmp");
    {
      let file = File::create(&temp_path).map_err(|source| io_error(&temp_path, source))?;
      let mut writer = BufWriter::new(file);
      for activation in activations {
        serde_json::to_writer(&mut writer, activation)?;
        writer.write_all(b"\n").map_err(|source| io_error(&temp_path, source))?;
      }
      let file = writer
        .into_inner()
        .map_err(|err| io_error(&temp_path, err.into_error()))?;
      file.sync_all().map_err(|source| io_error(&temp_path, source))?;
    }
    fs::rename(&temp_path, &self.path).map_err(|source| io_error(&self.path, source))
  }
}

impl ActivationStore for JsonlStore {
  fn append(&mut self, activation: &Activation) -> Result<(), UsageError> {
    let mut line = serde_json::to_vec(activation)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .map_err(|source| io_error(&self.path, source))?;
    file.write_all(&line).map_err(|source| io_error(&self.path, source))?;
    file.sync_data().map_err(|source| io_error(&self.path, source))
  }

  fn load(&self) -> Result<Vec<Activation>, UsageError> {
    let file = match File::open(&self.path) {
      Ok(file) => file,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => return Err(io_error(&self.path, source)),
    };

    let mut activations = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
      let line = line.map_err(|source| io_error(&self.path, source))?;
      if line.trim().is_empty() {
        continue;
      }
      match serde_json::from_str::<Activation>(&line) {
        Ok(activation) => activations.push(activation),
        Err(err) => warn!(
          path = %self.path.display(),
          line = number + 1,
          error = %err,
          "Skipping unreadable activation record"
        ),
      }
    }
    Ok(activations)
  }

  fn retain_since(&mut self, cutoff: DateTime<Utc>) -> Result<usize, UsageError> {
    let activations = self.load()?;
    let before = activations.len();
    let kept: Vec<Activation> = activations
      .into_iter()
      .filter(|activation| activation.timestamp >= cutoff)
      .collect();
    let removed = before - kept.len();
    if removed > 0 {
      self.rewrite(&kept)?;
      debug!(path = %self.path.display(), removed, "Pruned activation log");
    }
    Ok(removed)
  }

  fn clear(&mut self) -> Result<(), UsageError> {
    File::create(&self.path)
      .and_then(|file| file.sync_all())
      .map_err(|source| io_error(&self.path, source))
  }
}

fn io_error(path: &Path, source: std::io::Error) -> UsageError {
  UsageError::Io {
    path: path.display().to_string(),
    source,
  }
}
