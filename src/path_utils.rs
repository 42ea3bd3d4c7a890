//! Lexical path helpers shared by the sandbox resolver and the policy rules.
//!
//! Nothing here touches the filesystem or follows symlinks. `normalize_path_lexical` drops `.`,
//! folds `..` into the preceding name, keeps leading `..` on relative paths, and clamps `..` at
//! the root of absolute paths.
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;

/// Compiles a shell-style pattern the way `fnmatch` reads it: `*` and `?` may cross `/`.
pub(crate) fn build_glob(pattern: &str) -> std::result::Result<globset::Glob, globset::Error> {
    let pattern = if cfg!(windows) {
        pattern.replace('\\', "/")
    } else {
        pattern.to_string()
    };
    let mut builder = GlobBuilder::new(pattern.trim_start_matches("./"));
    builder
        .literal_separator(false)
        .case_insensitive(cfg!(windows));
    builder.build()
}

pub fn normalize_path_lexical(path: &Path) -> PathBuf {
    let mut anchor = PathBuf::new();
    let mut names = Vec::<Component<'_>>::new();

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => anchor.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match names.last() {
                Some(Component::Normal(_)) => {
                    names.pop();
                }
                _ if anchor.has_root() => {}
                _ => names.push(component),
            },
            Component::Normal(_) => names.push(component),
        }
    }

    let normalized = names
        .iter()
        .fold(anchor, |mut out, name| {
            out.push(name.as_os_str());
            out
        });
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Component-wise ancestor test: `/a/bc` is *not* within `/a/b`.
pub fn is_within(path: &Path, root: &Path) -> bool {
    normalize_path_lexical(path).starts_with(normalize_path_lexical(root))
}

/// Root-relative form of `path`, or `None` when `path` is not within `root`.
pub(crate) fn relative_to(path: &Path, root: &Path) -> Option<PathBuf> {
    let path = normalize_path_lexical(path);
    let root = normalize_path_lexical(root);
    path.strip_prefix(&root).ok().map(|rel| {
        if rel.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            rel.to_path_buf()
        }
    })
}

/// Renders a relative path with `/` separators.
///
/// Fails closed (`None`) on non-Unicode components or anything that is not a plain relative path;
/// a lossy conversion could otherwise let a denied path slip past glob rules.
pub(crate) fn to_posix(relative: &Path) -> Option<String> {
    let mut parts = Vec::<&str>::new();
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        Some(".".to_string())
    } else {
        Some(parts.join("/"))
    }
}
