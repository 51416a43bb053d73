use crate::pipeline::{ModuleId, PlaceholderToken};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {start}..{end} is outside the source ({len} bytes)")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("edit {start}..{end} does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
    #[error("edit {start}..{end} overlaps an earlier edit")]
    Overlap { start: usize, end: usize },
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("cannot find module `{specifier}` from `{importer}`")]
    Unresolved {
        specifier: String,
        importer: ModuleId,
    },
    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("output format `{0}` is not supported, set it to `amd` or `es`")]
    UnsupportedFormat(String),
    #[error("a leading banner is not supported with the `amd` format")]
    BannerUnsupported,
    #[error("unit `{unit}` does not start with a `define(` declaration")]
    MalformedDeclaration { unit: ModuleId },
    #[error("unit `{unit}` has no final address")]
    MissingAddress { unit: ModuleId },
    #[error("placeholder {token} in unit `{unit}` does not resolve to a compiled unit")]
    UnresolvedPlaceholder {
        token: PlaceholderToken,
        unit: ModuleId,
    },
    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration")]
    Parse(#[from] toml::de::Error),
}
