//! Collector definition loading from TOML files.
//!
//! Definitions live in `collector-definitions/`, one file per kind named
//! after the kind (`linkedin_profile.toml`), optionally grouped into
//! category subdirectories.

use crate::{
    definition::CollectorDefinition,
    error::{DefinitionError, Result},
};
use prospector_core::CollectorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Loader for collector definitions from TOML files.
pub struct CollectorLoader {
    definitions_dir: PathBuf,
}

impl CollectorLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(DefinitionError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using the default definitions directory.
    ///
    /// Looks for `collector-definitions/` at the workspace root, walking up
    /// from the current directory.
    ///
    /// # Errors
    /// Returns error if the default directory doesn't exist.
    pub fn with_default_dir() -> Result<Self> {
        let mut current_dir = std::env::current_dir()?;

        loop {
            let cargo_toml = current_dir.join("Cargo.toml");
            if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
                if contents.contains("[workspace]") {
                    return Self::new(current_dir.join("collector-definitions"));
                }
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Self::new("collector-definitions")
    }

    /// Directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Load a single definition by kind.
    ///
    /// # Errors
    /// Returns error if the file doesn't exist, can't be read, or is invalid.
    pub fn load(&self, kind: CollectorKind) -> Result<CollectorDefinition> {
        let filename = format!("{}.toml", kind.as_str());
        let path = Self::find_file(&self.definitions_dir, &filename)?.ok_or_else(|| {
            DefinitionError::NotFound {
                kind: kind.to_string(),
            }
        })?;

        let definition = Self::load_from_path(&path)?;
        if definition.kind() != kind {
            return Err(DefinitionError::ValidationError {
                kind: kind.to_string(),
                reason: format!(
                    "{} declares kind {}",
                    path.display(),
                    definition.kind()
                ),
            });
        }
        definition.validate()?;

        debug!(
            kind = %kind,
            name = %definition.name(),
            "loaded collector definition"
        );

        Ok(definition)
    }

    /// Load all definitions from the definitions directory.
    ///
    /// Invalid definitions are logged as warnings and skipped.
    ///
    /// # Errors
    /// Returns error if the directory can't be read.
    pub fn load_all(&self) -> Result<Vec<CollectorDefinition>> {
        let mut definitions = Vec::new();

        Self::walk_and_load_recursive(&self.definitions_dir, &mut definitions)?;
        definitions.sort_by_key(CollectorDefinition::kind);

        info!(
            count = definitions.len(),
            dir = %self.definitions_dir.display(),
            "loaded collector definitions"
        );

        Ok(definitions)
    }

    fn walk_and_load_recursive(dir: &Path, definitions: &mut Vec<CollectorDefinition>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                Self::walk_and_load_recursive(&path, definitions)?;
                continue;
            }
            if path.extension().and_then(|s| s.to_str()) != Some("toml") {
                continue;
            }

            let definition = match Self::load_from_path(&path) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load collector definition"
                    );
                    continue;
                }
            };

            if let Err(e) = definition.validate() {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping invalid collector definition"
                );
                continue;
            }

            if definitions.iter().any(|d| d.kind() == definition.kind()) {
                warn!(
                    path = %path.display(),
                    kind = %definition.kind(),
                    "skipping duplicate collector definition"
                );
                continue;
            }

            definitions.push(definition);
        }

        Ok(())
    }

    fn find_file(dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                if let Some(found) = Self::find_file(&path, filename)? {
                    return Ok(Some(found));
                }
            } else if path.file_name().and_then(|s| s.to_str()) == Some(filename) {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }

    fn load_from_path(path: &Path) -> Result<CollectorDefinition> {
        let contents = std::fs::read_to_string(path).map_err(|e| DefinitionError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        toml::from_str(&contents).map_err(|e| DefinitionError::ParseError {
            path: path.display().to_string(),
            source: e,
        })
    }
}
