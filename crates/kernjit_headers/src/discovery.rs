//! Filesystem discovery of header search directories.
//!
//! There is no public toolchain API that yields the platform's header layout,
//! so discovery hardcodes the conventional Linux locations and enumerates
//! versioned C++ standard library directories beneath them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::cache::{HeaderCache, SearchKind};

/// File extensions treated as headers. The empty string matches
/// extensionless files such as `<vector>`.
const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "tcc", ""];

/// Returns `true` if every `.`-separated token of `name` is all digits.
///
/// `"7"` and `"7.3.0"` qualify, `"x86_64-linux-gnu"` does not. The empty
/// string qualifies vacuously, as does `"7..3"`.
pub fn is_version_number(name: &str) -> bool {
    name.split('.').all(|token| token.chars().all(|c| c.is_ascii_digit()))
}

/// Multiarch triple used by Debian-style include layouts for this host.
pub fn multiarch_triple() -> Option<&'static str> {
    if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        Some("x86_64-linux-gnu")
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        Some("aarch64-linux-gnu")
    } else if cfg!(all(target_os = "linux", target_arch = "arm")) {
        Some("arm-linux-gnueabihf")
    } else {
        None
    }
}

/// Directories scanned when the header cache is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderLayout {
    /// Roots whose version-named subdirectories hold C++ standard headers.
    pub cxx_roots: Vec<PathBuf>,
    /// Toolchain builtin headers (`<resource dir>/include` and, for gcc,
    /// `include-fixed`).
    pub builtin: Vec<PathBuf>,
    /// Platform-specific C headers, e.g. `/usr/include/x86_64-linux-gnu`.
    pub platform: Option<PathBuf>,
    /// Generic C headers, normally `/usr/include`.
    pub system: Option<PathBuf>,
    /// Project header roots (linear-algebra library, framework headers).
    pub project: Vec<PathBuf>,
    /// Additional user header roots, searched last.
    pub user: Vec<PathBuf>,
}

impl HeaderLayout {
    /// The conventional layout of a Linux host.
    pub fn host(builtin: Vec<PathBuf>, project: Vec<PathBuf>) -> Self {
        let usr_include = PathBuf::from("/usr/include");
        let mut cxx_roots = Vec::new();
        let platform = multiarch_triple().map(|triple| {
            let dir = usr_include.join(triple);
            cxx_roots.push(dir.join("c++"));
            dir
        });
        cxx_roots.push(usr_include.join("c++"));
        Self {
            cxx_roots,
            builtin,
            platform,
            system: Some(usr_include),
            project,
            user: Vec::new(),
        }
    }
}

/// Summary of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Search directories registered.
    pub paths: usize,
    /// Header files read into the cache.
    pub files: usize,
    /// Header files that could not be read.
    pub skipped: usize,
}

/// Populates `cache` from `layout` and marks it valid.
///
/// Returns `None` without touching the filesystem if the cache is already
/// valid. Directories that do not exist are skipped. When `cache_files` is
/// set, every header below each directory is read into the cache under its
/// real path; unreadable files are skipped.
///
/// The versioned C++ directories come first because the standard library
/// headers `#include_next` the C headers that follow them. Among several
/// version directories the order is whatever the filesystem yields.
pub fn populate(
    cache: &mut HeaderCache,
    layout: &HeaderLayout,
    cache_files: bool,
) -> Option<PopulateReport> {
    if cache.is_valid() {
        return None;
    }
    cache.record_scan();

    let mut system_dirs: Vec<PathBuf> = Vec::new();
    for root in &layout.cxx_roots {
        system_dirs.extend(version_dirs(root));
    }
    system_dirs.extend(layout.builtin.iter().cloned());
    system_dirs.extend(layout.platform.iter().cloned());
    system_dirs.extend(layout.system.iter().cloned());
    system_dirs.extend(layout.project.iter().cloned());

    let entries = system_dirs
        .into_iter()
        .map(|p| (p, SearchKind::System))
        .chain(layout.user.iter().cloned().map(|p| (p, SearchKind::User)));

    let mut report = PopulateReport::default();
    for (dir, kind) in entries {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "header directory missing; skipped");
            continue;
        }
        if cache.include_paths().iter().any(|e| e.path == dir) {
            continue;
        }
        cache.add_entry(dir.clone(), kind);
        report.paths += 1;

        if cache_files {
            let files = collect_header_files(&dir);
            let loaded: Vec<(PathBuf, Vec<u8>)> = files
                .par_iter()
                .filter_map(|f| std::fs::read(f).ok().map(|c| (f.clone(), c)))
                .collect();
            report.skipped += files.len() - loaded.len();
            report.files += loaded.len();
            for (path, content) in loaded {
                cache.add_file(path, content);
            }
        }
    }

    cache.set_valid();
    tracing::info!(
        paths = report.paths,
        files = report.files,
        skipped = report.skipped,
        "header cache populated"
    );
    Some(report)
}

/// Lists the immediate subdirectories of `root` whose names are version numbers.
///
/// Entries are returned in directory iteration order. Symlinked version
/// directories count.
pub fn version_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter(|e| e.file_name().to_str().is_some_and(is_version_number))
        .map(|e| e.path())
        .collect()
}

/// Recursively lists header files under `dir`, sorted by path.
///
/// Symlinks are followed. Each real directory is walked once, so link cycles
/// terminate.
pub fn collect_header_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    walk_dir(dir, &mut files, &mut visited);
    files.sort();
    files
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) {
    let Ok(real) = std::fs::canonicalize(dir) else {
        return;
    };
    if !visited.insert(real) {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let Ok(meta) = std::fs::metadata(&path) else {
            continue;
        };
        if meta.is_dir() {
            walk_dir(&path, files, visited);
        } else if meta.is_file() && is_header(&path) {
            files.push(path);
        }
    }
}

fn is_header(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    HEADER_EXTENSIONS.contains(&ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn version_number_classification() {
        assert!(is_version_number("7"));
        assert!(is_version_number("7.3.0"));
        assert!(is_version_number("12"));
        assert!(!is_version_number("x86_64-linux-gnu"));
        assert!(!is_version_number("7.3-rc1"));
        assert!(!is_version_number("backward"));
    }

    #[test]
    fn empty_string_is_vacuously_a_version() {
        assert!(is_version_number(""));
        assert!(is_version_number("."));
    }

    #[test]
    fn header_extensions() {
        assert!(is_header(Path::new("/usr/include/stdio.h")));
        assert!(is_header(Path::new("/usr/include/c++/12/vector")));
        assert!(is_header(Path::new("/opt/eigen/Eigen/src/Core/Matrix.hpp")));
        assert!(is_header(Path::new("/usr/include/c++/12/bits/vector.tcc")));
        assert!(!is_header(Path::new("/opt/eigen/README.md")));
        assert!(!is_header(Path::new("/opt/eigen/lib.cpp")));
    }

    fn fake_layout(root: &Path) -> HeaderLayout {
        let cxx = root.join("c++");
        fs::create_dir_all(cxx.join("12/bits")).unwrap();
        fs::create_dir_all(cxx.join("backward")).unwrap();
        fs::write(cxx.join("12/vector"), "// vector\n").unwrap();
        fs::write(cxx.join("12/bits/stl_vector.tcc"), "// tcc\n").unwrap();
        fs::write(cxx.join("12/NOTES.txt"), "not a header\n").unwrap();

        let system = root.join("include");
        fs::create_dir_all(&system).unwrap();
        fs::write(system.join("stdio.h"), "// stdio\n").unwrap();

        let project = root.join("project");
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("kernel.hpp"), "// kernel\n").unwrap();

        HeaderLayout {
            cxx_roots: vec![cxx],
            builtin: Vec::new(),
            platform: Some(root.join("missing-platform")),
            system: Some(system),
            project: vec![project],
            user: vec![root.join("project")],
        }
    }

    #[test]
    fn version_dirs_skips_non_versions() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_layout(dir.path());
        let found = version_dirs(&layout.cxx_roots[0]);
        assert_eq!(found, vec![dir.path().join("c++/12")]);
    }

    #[test]
    fn populate_registers_paths_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_layout(dir.path());
        let mut cache = HeaderCache::new();

        let report = populate(&mut cache, &layout, false).unwrap();
        assert_eq!(report.paths, 3);
        assert_eq!(report.files, 0);
        assert!(cache.is_valid());

        let paths: Vec<_> = cache.include_paths().iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                dir.path().join("c++/12"),
                dir.path().join("include"),
                dir.path().join("project"),
            ]
        );
        // The user root duplicates the project root and keeps its system kind.
        assert!(cache
            .include_paths()
            .iter()
            .all(|e| e.kind == SearchKind::System));
        assert!(cache.header_map().is_empty());
    }

    #[test]
    fn populate_caches_header_contents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_layout(dir.path());
        let mut cache = HeaderCache::new();

        let report = populate(&mut cache, &layout, true).unwrap();
        assert_eq!(report.files, 4);
        assert_eq!(report.skipped, 0);
        let vector = dir.path().join("c++/12/vector");
        assert_eq!(&*cache.header_map()[&vector], b"// vector\n");
        assert!(!cache
            .header_map()
            .contains_key(&dir.path().join("c++/12/NOTES.txt")));
    }

    #[test]
    fn second_populate_does_not_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let layout = fake_layout(dir.path());
        let mut cache = HeaderCache::new();
        populate(&mut cache, &layout, true).unwrap();

        let paths_before = cache.include_paths().to_vec();
        let files_before = cache.header_map().len();

        // New headers appearing on disk must not be picked up.
        fs::write(dir.path().join("include/late.h"), "// late\n").unwrap();
        assert!(populate(&mut cache, &layout, true).is_none());

        assert_eq!(cache.scan_count(), 1);
        assert_eq!(cache.include_paths(), paths_before.as_slice());
        assert_eq!(cache.header_map().len(), files_before);
    }

    #[test]
    fn user_roots_are_user_kind() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user");
        fs::create_dir_all(&user).unwrap();
        let layout = HeaderLayout {
            user: vec![user.clone()],
            ..HeaderLayout::default()
        };
        let mut cache = HeaderCache::new();
        populate(&mut cache, &layout, false).unwrap();
        assert_eq!(cache.include_paths()[0].path, user);
        assert_eq!(cache.include_paths()[0].kind, SearchKind::User);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_followed() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(real.join("Core")).unwrap();
        fs::write(real.join("Core/Matrix.h"), "// matrix\n").unwrap();

        let root = dir.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("top.h"), "// top\n").unwrap();
        symlink(&real, root.join("linked")).unwrap();
        symlink(real.join("Core/Matrix.h"), root.join("alias.h")).unwrap();
        // A cycle back to the root must not recurse forever.
        symlink(&root, root.join("loop")).unwrap();

        let files = collect_header_files(&root);
        assert_eq!(
            files,
            vec![
                root.join("alias.h"),
                root.join("linked/Core/Matrix.h"),
                root.join("top.h"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_version_dir_is_found() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("gcc-12-headers");
        fs::create_dir_all(&real).unwrap();
        let cxx = dir.path().join("c++");
        fs::create_dir_all(&cxx).unwrap();
        std::os::unix::fs::symlink(&real, cxx.join("12")).unwrap();
        assert_eq!(version_dirs(&cxx), vec![cxx.join("12")]);
    }

    #[test]
    fn host_layout_ends_with_usr_include() {
        let layout = HeaderLayout::host(Vec::new(), vec![PathBuf::from("/opt/eigen")]);
        assert_eq!(layout.system, Some(PathBuf::from("/usr/include")));
        assert_eq!(layout.cxx_roots.last(), Some(&PathBuf::from("/usr/include/c++")));
        assert_eq!(layout.project, vec![PathBuf::from("/opt/eigen")]);
    }
}
