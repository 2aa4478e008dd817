use std::path::{Path, PathBuf};

use crate::errors::{DataError, Result};
use crate::loader;
use crate::record::MeasurementRecord;

/// Strategy for producing the data-file path the loader consumes.
///
/// Interactive pickers, directory-convention lookups, and plain arguments
/// all fit behind this seam; the loader itself only ever sees a resolved
/// path. Returning `None` means the selection was cancelled.
pub trait PathResolver {
    fn resolve(&self) -> Option<PathBuf>;
}

/// The trivial resolver: a path the caller already has.
pub struct ExplicitPath(pub PathBuf);

impl PathResolver for ExplicitPath {
    fn resolve(&self) -> Option<PathBuf> {
        Some(self.0.clone())
    }
}

/// Loads a measurement through a path-resolution strategy.
pub fn load_with<R: PathResolver>(
    resolver: &R,
    metadata_path: Option<&Path>,
) -> Result<MeasurementRecord> {
    let path = resolver
        .resolve()
        .ok_or_else(|| DataError::Validation("no data file selected".to_string()))?;
    loader::load(&path, metadata_path)
}
