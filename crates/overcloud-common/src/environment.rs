//! Environment file list handling for deploy calls.

use crate::error::Error;
use crate::Result;
use std::path::{Path, PathBuf};

/// Put a fixed environment from the templates directory in front of the
/// user-supplied environment files.
///
/// The fixed environment must exist on disk. Any copy of it already present in
/// `environment_files` is dropped so it is applied exactly once, first.
pub fn prepend_environment(
    environment_files: &[PathBuf],
    templates_dir: &Path,
    environment: &str,
) -> Result<Vec<PathBuf>> {
    let full_path = templates_dir.join(environment);
    if !full_path.exists() {
        return Err(Error::Config(format!(
            "Expected environment file {} not found in {} cannot proceed.",
            environment,
            templates_dir.display()
        )));
    }

    let mut files = Vec::with_capacity(environment_files.len() + 1);
    files.push(full_path.clone());
    files.extend(
        environment_files
            .iter()
            .filter(|f| **f != full_path)
            .cloned(),
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FFWD_UPGRADE_PREPARE_ENV;

    fn templates_with(env: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(env);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "resource_registry: {}\n").unwrap();
        dir
    }

    #[test]
    fn test_prepend_puts_fixed_environment_first() {
        let templates = templates_with(FFWD_UPGRADE_PREPARE_ENV);
        let user = vec![PathBuf::from("/home/stack/network.yaml")];

        let files = prepend_environment(&user, templates.path(), FFWD_UPGRADE_PREPARE_ENV).unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0], templates.path().join(FFWD_UPGRADE_PREPARE_ENV));
        assert_eq!(files[1], PathBuf::from("/home/stack/network.yaml"));
    }

    #[test]
    fn test_prepend_drops_duplicate() {
        let templates = templates_with(FFWD_UPGRADE_PREPARE_ENV);
        let fixed = templates.path().join(FFWD_UPGRADE_PREPARE_ENV);
        let user = vec![PathBuf::from("/a.yaml"), fixed.clone()];

        let files = prepend_environment(&user, templates.path(), FFWD_UPGRADE_PREPARE_ENV).unwrap();

        assert_eq!(files, vec![fixed, PathBuf::from("/a.yaml")]);
    }

    #[test]
    fn test_prepend_missing_environment() {
        let templates = tempfile::tempdir().unwrap();
        let err = prepend_environment(&[], templates.path(), FFWD_UPGRADE_PREPARE_ENV).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("ffwd-upgrade-prepare.yaml"));
    }
}
