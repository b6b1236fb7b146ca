use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationErrors};
use crate::models::{CatalogIndex, CatalogRecord};

/// One line of the load log. Serialized with its snake_case variant name under `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadEvent {
    CatalogLoadStarted {
        root: String,
        files: usize,
        parallel: bool,
    },
    FileValidated {
        file: String,
        collections: usize,
        models: usize,
    },
    FileRejected {
        file: String,
        errors: Vec<ErrorRecord>,
    },
    CatalogLoaded {
        files: usize,
        collections: usize,
        models: usize,
    },
    CatalogRejected {
        errors: usize,
    },
}

impl LoadEvent {
    pub fn load_started(root: &Path, files: usize, parallel: bool) -> Self {
        LoadEvent::CatalogLoadStarted {
            root: root.display().to_string(),
            files,
            parallel,
        }
    }

    pub fn file_validated(file: &Path, record: &CatalogRecord) -> Self {
        LoadEvent::FileValidated {
            file: file.display().to_string(),
            collections: record.collections.len(),
            models: record.models.len(),
        }
    }

    pub fn file_rejected(file: &Path, errors: &ValidationErrors) -> Self {
        LoadEvent::FileRejected {
            file: file.display().to_string(),
            errors: errors.iter().map(ErrorRecord::from).collect(),
        }
    }

    pub fn catalog_loaded(files: usize, index: &CatalogIndex) -> Self {
        LoadEvent::CatalogLoaded {
            files,
            collections: index.collection_count(),
            models: index.model_count(),
        }
    }

    pub fn catalog_rejected(errors: &ValidationErrors) -> Self {
        LoadEvent::CatalogRejected {
            errors: errors.len(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoadEvent::CatalogLoadStarted { .. } => "catalog_load_started",
            LoadEvent::FileValidated { .. } => "file_validated",
            LoadEvent::FileRejected { .. } => "file_rejected",
            LoadEvent::CatalogLoaded { .. } => "catalog_loaded",
            LoadEvent::CatalogRejected { .. } => "catalog_rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&ValidationError> for ErrorRecord {
    fn from(error: &ValidationError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            path: error.field_path().map(str::to_string),
        }
    }
}

/// Append-only JSONL log of catalog loads, stamped with `catalog_id` and `ts`.
///
/// Clones share one lazily opened file handle, so loader worker threads can emit
/// concurrently without interleaving lines.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<Sink>,
}

#[derive(Debug)]
struct Sink {
    path: PathBuf,
    catalog_id: String,
    file: Mutex<Option<File>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, catalog_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Sink {
                path: path.into(),
                catalog_id: catalog_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    pub fn with_random_id(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Uuid::new_v4().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn catalog_id(&self) -> &str {
        &self.inner.catalog_id
    }

    pub fn emit(&self, event: &LoadEvent) -> anyhow::Result<Value> {
        let mut line = serde_json::to_value(event)?;
        if let Value::Object(fields) = &mut line {
            fields.insert(
                "catalog_id".to_string(),
                Value::String(self.inner.catalog_id.clone()),
            );
            fields.insert("ts".to_string(), Value::String(now_utc_iso()));
        }
        let mut text = serde_json::to_string(&line)?;
        text.push('\n');

        let mut file = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        if file.is_none() {
            *file = Some(open_log(&self.inner.path)?);
        }
        if let Some(file) = file.as_mut() {
            file.write_all(text.as_bytes())?;
        }
        Ok(line)
    }
}

fn open_log(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

pub(crate) fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
