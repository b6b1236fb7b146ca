use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: Option<PathBuf>,
    pub path: String,
}

impl Location {
    pub fn new(file: Option<&Path>, path: impl Into<String>) -> Self {
        Self {
            file: file.map(Path::to_path_buf),
            path: path.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file.display(), self.path),
            None => f.write_str(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Collection,
    Model,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Collection => f.write_str("collection name"),
            KeyKind::Model => f.write_str("model name or alias"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("schema error at {location}: {message}")]
    Schema { location: Location, message: String },

    #[error("reference error at {location}: collection '{collection}' is not defined")]
    Reference {
        location: Location,
        collection: String,
    },

    #[error("duplicate {kind} '{name}': declared at {first} and again at {second}")]
    DuplicateKey {
        kind: KeyKind,
        name: String,
        first: Location,
        second: Location,
    },

    #[error("parse error at {span}: {message}")]
    Parse { span: SourceSpan, message: String },

    #[error("failed to read {}: {message}", .file.display())]
    Io { file: PathBuf, message: String },
}

impl ValidationError {
    pub fn schema(location: Location, message: impl Into<String>) -> Self {
        ValidationError::Schema {
            location,
            message: message.into(),
        }
    }

    /// Short machine-readable tag, used in event logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Schema { .. } => "schema",
            ValidationError::Reference { .. } => "reference",
            ValidationError::DuplicateKey { .. } => "duplicate_key",
            ValidationError::Parse { .. } => "parse",
            ValidationError::Io { .. } => "io",
        }
    }

    pub fn field_path(&self) -> Option<&str> {
        match self {
            ValidationError::Schema { location, .. }
            | ValidationError::Reference { location, .. } => Some(location.path.as_str()),
            _ => None,
        }
    }
}

/// Non-empty, ordered list of violations found in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("catalog is invalid ({} error(s))", .0.len())]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub fn collect<T>(value: T, errors: Vec<ValidationError>) -> Result<T, ValidationErrors> {
    match ValidationErrors::from_vec(errors) {
        Some(errors) => Err(errors),
        None => Ok(value),
    }
}
