//! Lexical path helpers. Nothing here touches the file system.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without following symlinks. Leading `..`
/// of a relative path are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Render a relative path with `/` separators. Root and prefix components are dropped.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `dir/name.ext` -> `dir/name`. Dotfiles keep their name.
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |idx| idx + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Drop the `#anchor` suffix of an href.
pub fn strip_anchor(href: &str) -> &str {
    match href.find('#') {
        Some(idx) => &href[..idx],
        None => href,
    }
}
