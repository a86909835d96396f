//! Persistence of the three fitted stages.
//!
//! Each file holds a bincode envelope tagging the payload with the encoding
//! version and column order it was fit against. A mismatch is refused at
//! load time rather than served.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use crate::features::{Feature, ENCODING_VERSION};
use crate::model::Predictor;

pub const MODEL_FILE_NAME: &str = "heart_disease_model.bin";
pub const SCALER_FILE_NAME: &str = "scaler.bin";
pub const IMPUTER_FILE_NAME: &str = "imputer.bin";

const FORMAT_VERSION: u32 = 1;

/// Locations of the imputer, scaler and classifier artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub imputer: PathBuf,
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            imputer: dir.join(IMPUTER_FILE_NAME),
            scaler: dir.join(SCALER_FILE_NAME),
            model: dir.join(MODEL_FILE_NAME),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [self.imputer.as_path(), self.scaler.as_path(), self.model.as_path()].into_iter()
    }

    pub fn any_exists(&self) -> bool {
        self.iter().any(|p| p.exists())
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    format: u32,
    encoding_version: u32,
    columns: Vec<String>,
    payload: T,
}

fn encode<T: Serialize>(name: &'static str, payload: &T) -> Result<Vec<u8>, ArtifactError> {
    let envelope = Envelope {
        format: FORMAT_VERSION,
        encoding_version: ENCODING_VERSION,
        columns: Feature::ALL.iter().map(|f| f.column().to_string()).collect(),
        payload,
    };
    bincode::serialize(&envelope).map_err(|source| ArtifactError::Encode { name, source })
}

fn decode<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let envelope: Envelope<T> =
        bincode::deserialize(&bytes).map_err(|source| ArtifactError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let incompatible = |reason: String| ArtifactError::Incompatible {
        path: path.to_path_buf(),
        reason,
    };
    if envelope.format != FORMAT_VERSION {
        return Err(incompatible(format!(
            "format {} but this build reads {}",
            envelope.format, FORMAT_VERSION
        )));
    }
    if envelope.encoding_version != ENCODING_VERSION {
        return Err(incompatible(format!(
            "fit with encoding version {} but this build uses {}",
            envelope.encoding_version, ENCODING_VERSION
        )));
    }
    let expected: Vec<&str> = Feature::ALL.iter().map(|f| f.column()).collect();
    if envelope.columns != expected {
        return Err(incompatible(format!(
            "fit on columns {:?}, expected {:?}",
            envelope.columns, expected
        )));
    }
    Ok(envelope.payload)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write all three new artifacts or none of them. Everything is encoded up
/// front, then staged next to its destination and renamed into place. If a
/// rename fails the new artifacts already moved are removed and the staged
/// files are discarded. Older artifacts that were not yet replaced stay on
/// disk, and `load` refuses the incomplete set.
pub fn save(paths: &ArtifactPaths, predictor: &Predictor) -> Result<(), ArtifactError> {
    let encoded = [
        (&paths.imputer, encode("imputer", predictor.imputer())?),
        (&paths.scaler, encode("scaler", predictor.scaler())?),
        (&paths.model, encode("model", predictor.classifier())?),
    ];

    let mut staged: Vec<(PathBuf, &PathBuf)> = Vec::with_capacity(encoded.len());
    for (destination, bytes) in encoded.iter() {
        let staging = staging_path(destination);
        if let Err(source) = fs::write(&staging, bytes) {
            let _ = fs::remove_file(&staging);
            discard(&staged);
            return Err(ArtifactError::Io {
                path: staging,
                source,
            });
        }
        staged.push((staging, *destination));
    }

    for (i, (staging, destination)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(staging, destination) {
            discard(&staged[i..]);
            for (_, renamed) in &staged[..i] {
                let _ = fs::remove_file(renamed);
            }
            return Err(ArtifactError::Io {
                path: destination.to_path_buf(),
                source,
            });
        }
        log::debug!("wrote artifact {}", destination.display());
    }
    Ok(())
}

fn discard(staged: &[(PathBuf, &PathBuf)]) {
    for (staging, _) in staged {
        if let Err(e) = fs::remove_file(staging) {
            log::warn!("could not remove staged artifact {}: {}", staging.display(), e);
        }
    }
}

/// Load the fitted chain. Called once at service startup.
pub fn load(paths: &ArtifactPaths) -> Result<Predictor, ArtifactError> {
    let imputer = decode(&paths.imputer)?;
    let scaler = decode(&paths.scaler)?;
    let classifier = decode(&paths.model)?;
    log::info!(
        "loaded artifacts {}, {}, {}",
        paths.imputer.display(),
        paths.scaler.display(),
        paths.model.display()
    );
    Ok(Predictor::new(imputer, scaler, classifier))
}
