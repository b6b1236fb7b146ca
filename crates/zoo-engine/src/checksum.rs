use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use zoo_contracts::models::Model;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeightsCheck {
    /// The file's SHA-256 starts with the hash encoded in the weights filename.
    Match { expected: String, actual: String },
    Mismatch { expected: String, actual: String },
    /// The weights URL carries no hash suffix to compare against.
    NoExpectedHash { actual: String },
}

impl WeightsCheck {
    pub fn is_match(&self) -> bool {
        matches!(self, WeightsCheck::Match { .. })
    }
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_weights_file(model: &Model, path: &Path) -> Result<WeightsCheck> {
    let actual = sha256_file(path)?;
    let Some(expected) = model.weights_hash() else {
        return Ok(WeightsCheck::NoExpectedHash { actual });
    };
    let expected = expected.to_ascii_lowercase();
    if actual.starts_with(&expected) {
        Ok(WeightsCheck::Match { expected, actual })
    } else {
        Ok(WeightsCheck::Mismatch { expected, actual })
    }
}
