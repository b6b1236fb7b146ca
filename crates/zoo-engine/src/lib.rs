pub mod checksum;

use std::env;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};
use zoo_contracts::error::{SourceSpan, ValidationError, ValidationErrors};
use zoo_contracts::events::{EventWriter, LoadEvent};
use zoo_contracts::models::{CatalogIndex, SourcedRecord};
use zoo_contracts::schema::validate_document;

pub const DEFAULT_METAFILE_NAMES: [&str; 3] = ["metafile.yml", "metafile.yaml", "metafile.json"];
pub const IMPORT_KEY: &str = "Import";

const METAFILE_NAMES_ENV: &str = "ZOO_METAFILE_NAMES";
const PARALLEL_ENV: &str = "ZOO_PARALLEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub root: PathBuf,
    pub metafile_names: Vec<String>,
    pub parallel: bool,
}

impl LoaderConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metafile_names: DEFAULT_METAFILE_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            parallel: true,
        }
    }

    pub fn from_env(root: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(root);
        if let Ok(raw) = env::var(METAFILE_NAMES_ENV) {
            let names = split_names(&raw);
            if !names.is_empty() {
                config.metafile_names = names;
            }
        }
        if let Ok(raw) = env::var(PARALLEL_ENV) {
            config.parallel = parse_flag(&raw).unwrap_or(config.parallel);
        }
        config
    }

    pub fn with_metafile_names(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.metafile_names = names;
        }
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub index: CatalogIndex,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CatalogLoader {
    config: LoaderConfig,
    events: Option<EventWriter>,
}

impl CatalogLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn discover(&self) -> Result<Vec<PathBuf>, ValidationErrors> {
        let root = &self.config.root;
        if root.is_file() {
            return Ok(vec![root.clone()]);
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.is_metafile(entry.path()) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => errors.push(ValidationError::Io {
                    file: err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone()),
                    message: err.to_string(),
                }),
            }
        }
        files.sort();
        debug!(root = %root.display(), files = files.len(), "discovered catalog files");
        zoo_contracts::error::collect(files, errors)
    }

    fn is_metafile(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.config.metafile_names.iter().any(|m| m == name))
    }

    pub fn load(&self) -> Result<LoadedCatalog, ValidationErrors> {
        let files = self.discover()?;
        self.load_files(files)
    }

    /// Loads the record files listed under `Import` in a model index file. Paths resolve
    /// relative to the index file's directory.
    pub fn load_model_index(&self, index_path: &Path) -> Result<LoadedCatalog, ValidationErrors> {
        let files = read_imports(index_path)?;
        self.load_files(files)
    }

    /// Validates each file on its own (in parallel when enabled), then merges them on the
    /// calling thread. Duplicate and reference checks only happen during the merge.
    pub fn load_files(&self, files: Vec<PathBuf>) -> Result<LoadedCatalog, ValidationErrors> {
        self.emit(LoadEvent::load_started(
            &self.config.root,
            files.len(),
            self.config.parallel,
        ));

        let outcomes: Vec<Result<SourcedRecord, ValidationErrors>> = if self.config.parallel {
            files.par_iter().map(|file| self.validate_file(file)).collect()
        } else {
            files.iter().map(|file| self.validate_file(file)).collect()
        };

        let mut records = Vec::with_capacity(outcomes.len());
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(record) => records.push(record),
                Err(file_errors) => errors.extend(file_errors),
            }
        }
        // A collection defined in a rejected file would surface as spurious reference
        // errors, so merging only happens once every file is valid.
        if let Some(errors) = ValidationErrors::from_vec(errors) {
            return Err(self.reject(errors));
        }

        match CatalogIndex::build(records) {
            Ok(index) => {
                info!(
                    files = files.len(),
                    collections = index.collection_count(),
                    models = index.model_count(),
                    "catalog loaded"
                );
                self.emit(LoadEvent::catalog_loaded(files.len(), &index));
                Ok(LoadedCatalog { index, files })
            }
            Err(errors) => Err(self.reject(errors)),
        }
    }

    pub fn validate_file(&self, path: &Path) -> Result<SourcedRecord, ValidationErrors> {
        let outcome = read_document(path).and_then(|value| {
            validate_document(&value, Some(path)).map(|record| SourcedRecord {
                origin: Some(path.to_path_buf()),
                record,
            })
        });

        match &outcome {
            Ok(sourced) => {
                debug!(
                    file = %path.display(),
                    collections = sourced.record.collections.len(),
                    models = sourced.record.models.len(),
                    "validated catalog file"
                );
                self.emit(LoadEvent::file_validated(path, &sourced.record));
            }
            Err(errors) => {
                warn!(file = %path.display(), errors = errors.len(), "rejected catalog file");
                self.emit(LoadEvent::file_rejected(path, errors));
            }
        }
        outcome
    }

    fn reject(&self, errors: ValidationErrors) -> ValidationErrors {
        warn!(errors = errors.len(), "catalog rejected");
        self.emit(LoadEvent::catalog_rejected(&errors));
        errors
    }

    fn emit(&self, event: LoadEvent) {
        let Some(events) = &self.events else {
            return;
        };
        if let Err(err) = events.emit(&event) {
            warn!(event = event.name(), error = %err, "failed to write catalog event");
        }
    }
}

pub fn read_document(path: &Path) -> Result<Value, ValidationErrors> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        ValidationErrors::single(ValidationError::Io {
            file: path.to_path_buf(),
            message: err.to_string(),
        })
    })?;
    parse_document(path, &raw).map_err(ValidationErrors::single)
}

pub fn parse_document(path: &Path, raw: &str) -> Result<Value, ValidationError> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(raw).map_err(|err| ValidationError::Parse {
            span: SourceSpan {
                file: path.to_path_buf(),
                line: Some(err.line()).filter(|line| *line > 0),
                column: Some(err.column()).filter(|column| *column > 0),
            },
            message: err.to_string(),
        })
    } else {
        serde_yaml::from_str(raw).map_err(|err| {
            let location = err.location();
            ValidationError::Parse {
                span: SourceSpan {
                    file: path.to_path_buf(),
                    line: location.as_ref().map(|loc| loc.line()),
                    column: location.as_ref().map(|loc| loc.column()),
                },
                message: err.to_string(),
            }
        })
    }
}

fn read_imports(index_path: &Path) -> Result<Vec<PathBuf>, ValidationErrors> {
    let value = read_document(index_path)?;
    let base = index_path.parent().unwrap_or_else(|| Path::new(""));
    let location = |path: &str| {
        zoo_contracts::error::Location::new(Some(index_path), path.to_string())
    };

    let Some(imports) = value.get(IMPORT_KEY) else {
        return Err(ValidationErrors::single(ValidationError::schema(
            location(IMPORT_KEY),
            "missing required field",
        )));
    };
    let Some(items) = imports.as_array() else {
        return Err(ValidationErrors::single(ValidationError::schema(
            location(IMPORT_KEY),
            "expected a sequence of relative paths",
        )));
    };

    let mut files = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match item.as_str().map(str::trim).filter(|text| !text.is_empty()) {
            Some(relative) => files.push(base.join(relative)),
            None => errors.push(ValidationError::schema(
                location(&format!("{IMPORT_KEY}[{idx}]")),
                "expected a non-empty path string",
            )),
        }
    }
    zoo_contracts::error::collect(files, errors)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
