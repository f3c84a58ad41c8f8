//! Path preconditions checked before a chain is started

use crate::chunks::split_pattern;
use splitvault_core::{Error, Result};
use std::fs;
use std::path::Path;

/// Check the source and target of a backup
///
/// The source must be a readable directory; the target pattern's parent must
/// be a writable directory.
pub fn validate_backup_paths(source: &Path, target_pattern: &Path) -> Result<()> {
    require_readable_dir(source)?;
    let (dir, _) = split_pattern(target_pattern)?;
    require_writable_dir(&dir)
}

/// Check the source and target of a restore
///
/// The source must be a readable directory; the target must be a writable
/// directory.
pub fn validate_restore_paths(source: &Path, target: &Path) -> Result<()> {
    require_readable_dir(source)?;
    require_writable_dir(target)
}

fn require_dir(path: &Path) -> Result<fs::Metadata> {
    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::validation(format!("{} does not exist", path.display()))
        } else {
            Error::validation(format!("{} cannot be inspected: {}", path.display(), e))
        }
    })?;

    if !metadata.is_dir() {
        return Err(Error::validation(format!(
            "{} is not a folder",
            path.display()
        )));
    }
    Ok(metadata)
}

fn require_readable_dir(path: &Path) -> Result<()> {
    require_dir(path)?;
    fs::read_dir(path)
        .map_err(|_| Error::validation(format!("{} cannot be read", path.display())))?;
    Ok(())
}

// permission bits only; ACLs and read-only mounts surface later as stage failures
fn require_writable_dir(path: &Path) -> Result<()> {
    let metadata = require_dir(path)?;
    if metadata.permissions().readonly() {
        return Err(Error::validation(format!(
            "{} cannot be written to",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_paths_ok() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        validate_backup_paths(source.path(), &target.path().join("home.tar.gz.gpg-")).unwrap();
    }

    #[test]
    fn test_missing_source() {
        let target = tempfile::tempdir().unwrap();
        let err = validate_backup_paths(
            Path::new("/nonexistent/splitvault"),
            &target.path().join("x-"),
        )
        .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_source_must_be_folder() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, b"x").unwrap();

        let err = validate_restore_paths(&file, dir.path()).unwrap_err();
        assert!(err.to_string().contains("is not a folder"));
    }

    #[test]
    fn test_backup_target_parent_must_exist() {
        let source = tempfile::tempdir().unwrap();
        let err = validate_backup_paths(source.path(), Path::new("/nonexistent/splitvault/x-"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/splitvault"));
    }

    #[test]
    fn test_restore_target_must_be_writable() {
        use std::os::unix::fs::PermissionsExt;

        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        std::fs::set_permissions(target.path(), std::fs::Permissions::from_mode(0o555)).unwrap();

        let err = validate_restore_paths(source.path(), target.path()).unwrap_err();
        assert!(err.to_string().contains("cannot be written to"));

        std::fs::set_permissions(target.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        validate_restore_paths(source.path(), target.path()).unwrap();
    }
}
