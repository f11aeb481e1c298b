//! Data file loading: reads item/signal/prototype files and builds the
//! immutable [`GameData`] tables.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers. A dataset directory holds `items.*`,
//! `prototypes.*`, and optionally `signals.*`; exactly one format per base
//! name.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::schema::{ItemData, PrototypeData, SignalData};
use crate::{GameData, GameDataBuilder, GameDataError};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A definition conflicts with one already registered.
    #[error("invalid definition in {file}: {source}")]
    Invalid {
        file: PathBuf,
        source: GameDataError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without
/// extension). Returns `Ok(None)` if no file is found, or
/// `Err(ConflictingFormats)` if multiple formats exist for the same base.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(
    dir: &Path,
    base_name: &'static str,
) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize a list from a file. For TOML files, extracts the array at
/// the given `toml_key` from a top-level table. For RON and JSON, the file
/// body is the list itself.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Toml => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: format!("missing key '{toml_key}' in TOML file"),
                })?
                .clone();
            array
                .try_into()
                .map_err(|e: toml::de::Error| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })
        }
    }
}

// ===========================================================================
// Top-level loading
// ===========================================================================

/// Load a dataset directory into immutable [`GameData`] tables.
///
/// Requires `items.*` and `prototypes.*`; `signals.*` (virtual and fluid
/// signals) is optional since item signals are implied by the item table.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let mut builder = GameDataBuilder::new();

    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    for item in &items {
        builder
            .register_item(&item.name, item.stack_size)
            .map_err(|source| DataLoadError::Invalid {
                file: items_path.clone(),
                source,
            })?;
    }

    if let Some(signals_path) = find_data_file(dir, "signals")? {
        let signals: Vec<SignalData> = deserialize_list(&signals_path, "signals")?;
        for signal in &signals {
            builder
                .register_signal(&signal.name, signal.kind)
                .map_err(|source| DataLoadError::Invalid {
                    file: signals_path.clone(),
                    source,
                })?;
        }
    }

    let protos_path = require_data_file(dir, "prototypes")?;
    let protos: Vec<PrototypeData> = deserialize_list(&protos_path, "prototypes")?;
    for proto in &protos {
        builder
            .register_prototype(
                &proto.name,
                &proto.class,
                proto.tile_width,
                proto.tile_height,
                proto.flags(),
            )
            .map_err(|source| DataLoadError::Invalid {
                file: protos_path.clone(),
                source,
            })?;
    }

    Ok(builder.build())
}

// ===========================================================================
// Tests
// ===========================================================================
