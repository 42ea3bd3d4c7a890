use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

pub const URI_SCHEME: &str = "privacy://";

/// A path proven to resolve inside the sandbox root.
///
/// The absolute form stays crate-private; callers only ever see the root-relative form and the
/// synthetic `privacy://` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl SandboxPath {
    pub(crate) fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Root-relative path with `/` separators (`.` for the root itself).
    pub fn relpath(&self) -> String {
        crate::path_utils::to_posix(&self.relative)
            .unwrap_or_else(|| self.relative.to_string_lossy().replace('\\', "/"))
    }

    pub fn uri(&self) -> String {
        format!("{URI_SCHEME}{}", self.relpath())
    }

    pub fn exists(&self) -> bool {
        self.absolute.exists()
    }

    pub fn is_file(&self) -> bool {
        self.absolute.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.absolute.is_dir()
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.absolute.file_name()
    }
}

/// Canonicalizes `path`, tolerating a missing tail.
///
/// The deepest existing ancestor is canonicalized (resolving every symlink along it) and the
/// remaining components are appended after lexical normalization. A `..` in the missing tail is
/// applied against the canonical ancestor, so it cannot hide an escape.
pub(crate) fn canonicalize_lenient(path: &Path) -> std::io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(canonical) => return Ok(canonical),
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        Err(_) => {}
    }

    let mut missing = Vec::<Component<'_>>::new();
    let mut ancestor = path;
    loop {
        let Some(parent) = ancestor.parent() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no existing ancestor",
            ));
        };
        if let Some(last) = ancestor.components().next_back() {
            missing.push(last);
        }
        ancestor = parent;
        match fs::symlink_metadata(ancestor) {
            Ok(_) => break,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        }
    }

    let mut out = ancestor.canonicalize()?;
    for component in missing.into_iter().rev() {
        out.push(component.as_os_str());
    }
    Ok(crate::path_utils::normalize_path_lexical(&out))
}

/// Joins `relative_path` onto `root_dir`, resolves it fully, and proves containment.
///
/// Containment is a component-wise ancestor test on canonical paths, so a sibling sharing a
/// string prefix with the root (`/a/bc` next to `/a/b`) is rejected. Absolute inputs are allowed
/// but must still land inside the root.
pub fn resolve(relative_path: &Path, root_dir: &Path) -> Result<SandboxPath> {
    let requested = if relative_path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        relative_path
    };

    let canonical_root = root_dir.canonicalize().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound {
                path: PathBuf::from("."),
            }
        } else {
            Error::io_path("canonicalize", ".", err)
        }
    })?;

    let joined = canonical_root.join(requested);
    let escape = || Error::PathEscape {
        path: crate::path_utils::normalize_path_lexical(requested),
    };

    // Lexical pre-check: `..` chains are rejected before the filesystem is consulted.
    if requested.is_relative() && !crate::path_utils::is_within(&joined, &canonical_root) {
        return Err(escape());
    }

    let absolute = canonicalize_lenient(&joined)
        .map_err(|err| Error::io_path("canonicalize", requested, err))?;
    if !crate::path_utils::is_within(&absolute, &canonical_root) {
        return Err(escape());
    }

    let relative = crate::path_utils::relative_to(&absolute, &canonical_root).ok_or_else(|| {
        Error::InvalidPath(format!(
            "failed to derive root-relative path for {}",
            requested.display()
        ))
    })?;
    Ok(SandboxPath { absolute, relative })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn resolves_nested_file_to_relative_form() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("docs")).expect("mkdir");
        std::fs::write(dir.path().join("docs/a.txt"), "hi").expect("write");

        let resolved = resolve(Path::new("docs/./a.txt"), dir.path()).expect("resolve");
        assert_eq!(resolved.relative(), Path::new("docs/a.txt"));
        assert_eq!(resolved.relpath(), "docs/a.txt");
        assert_eq!(resolved.uri(), "privacy://docs/a.txt");
        assert!(resolved.is_file());
    }

    #[test]
    fn empty_path_is_the_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolved = resolve(Path::new(""), dir.path()).expect("resolve");
        assert_eq!(resolved.relpath(), ".");
        assert!(resolved.is_dir());
    }

    #[test]
    fn parent_segments_escaping_root_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("root");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(dir.path().join("outside.txt"), "x").expect("write");

        for input in ["../outside.txt", "a/../../outside.txt", "../../../../etc/passwd", ".."] {
            match resolve(Path::new(input), &root).expect_err("should escape") {
                Error::PathEscape { .. } => {}
                other => panic!("unexpected error for {input}: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_file_resolves_without_escaping() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolved = resolve(Path::new("nope/../missing.txt"), dir.path()).expect("resolve");
        assert_eq!(resolved.relpath(), "missing.txt");
        assert!(!resolved.exists());
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("data");
        let sibling = dir.path().join("database");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::create_dir(&sibling).expect("mkdir");
        std::fs::write(sibling.join("dump.txt"), "x").expect("write");

        match resolve(Path::new("../database/dump.txt"), &root).expect_err("should escape") {
            Error::PathEscape { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
        match resolve(&sibling.join("dump.txt"), &root).expect_err("should escape") {
            Error::PathEscape { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn symlink_pointing_outside_root_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("root");
        std::fs::create_dir(&root).expect("mkdir");
        std::fs::write(dir.path().join("secret.txt"), "x").expect("write");
        std::os::unix::fs::symlink(dir.path().join("secret.txt"), root.join("link.txt"))
            .expect("symlink");
        std::os::unix::fs::symlink(dir.path(), root.join("up")).expect("symlink");

        for input in ["link.txt", "up/secret.txt", "up/not-there.txt"] {
            match resolve(Path::new(input), &root).expect_err("should escape") {
                Error::PathEscape { .. } => {}
                other => panic!("unexpected error for {input}: {other:?}"),
            }
        }
    }

    #[test]
    fn absolute_input_inside_root_is_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "x").expect("write");
        let resolved = resolve(&dir.path().join("a.txt"), dir.path()).expect("resolve");
        assert_eq!(resolved.relpath(), "a.txt");
    }

    #[test]
    fn missing_root_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        match resolve(Path::new("a.txt"), &dir.path().join("gone")).expect_err("missing root") {
            Error::NotFound { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
