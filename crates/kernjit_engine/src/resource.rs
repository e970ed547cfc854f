//! Builtin resource directory resolution.

use std::path::{Path, PathBuf};

use kernjit_headers::discovery::version_dirs;

use crate::toolchain::{CompilerFamily, Toolchain};

/// Resolves the toolchain's builtin resource directory.
///
/// A clang toolchain shipped alongside the hosting executable is found at
/// `<exe dir>/../lib/clang/<version>`. Otherwise the driver is asked.
pub fn resolve_resource_dir(toolchain: &Toolchain) -> Option<PathBuf> {
    let beside_exe = match toolchain.family() {
        CompilerFamily::Clang => std::env::current_exe()
            .ok()
            .and_then(|exe| resource_dir_beside(&exe)),
        CompilerFamily::Gcc => None,
    };
    let resolved = beside_exe.or_else(|| toolchain.query_resource_dir());
    match &resolved {
        Some(dir) => tracing::debug!(dir = %dir.display(), "resolved resource directory"),
        None => tracing::debug!("no resource directory found"),
    }
    resolved
}

/// Looks for `../lib/clang/<version>` relative to an executable.
pub fn resource_dir_beside(executable: &Path) -> Option<PathBuf> {
    let prefix = executable.parent()?.parent()?;
    version_dirs(&prefix.join("lib").join("clang"))
        .into_iter()
        .next()
}

/// Builtin header directories below a resource directory.
///
/// gcc keeps some fixed-up C headers in `include-fixed` next to `include`.
pub fn builtin_include_dirs(resource_dir: &Path) -> Vec<PathBuf> {
    ["include", "include-fixed"]
        .iter()
        .map(|d| resource_dir.join(d))
        .filter(|d| d.is_dir())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_versioned_resource_dir_beside_executable() {
        let root = tempfile::tempdir().unwrap();
        let bin = root.path().join("bin");
        let res = root.path().join("lib/clang/17");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&res).unwrap();
        std::fs::create_dir_all(root.path().join("lib/clang/notes")).unwrap();

        let found = resource_dir_beside(&bin.join("host-app")).unwrap();
        assert_eq!(found, res);
    }

    #[test]
    fn no_resource_dir_without_layout() {
        let root = tempfile::tempdir().unwrap();
        assert!(resource_dir_beside(&root.path().join("bin/host-app")).is_none());
    }

    #[test]
    fn builtin_dirs_only_existing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("include")).unwrap();
        assert_eq!(
            builtin_include_dirs(root.path()),
            vec![root.path().join("include")]
        );
    }
}
