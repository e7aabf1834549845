//! Path rules for the virtual file tree.
//!
//! The root is `/`. Folder paths end with `/` (`/docs/2025/`), file paths do
//! not (`/docs/2025/report.pdf`). A parent path is always a folder path.

use serde::Serialize;

pub const ROOT: &str = "/";

/// Characters never allowed in a folder or entry name.
pub const FORBIDDEN_NAME_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const MAX_NAME_LEN: usize = 255;

/// Why a name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameProblem {
    Empty,
    Reserved,
    TooLong,
    ForbiddenChar(char),
    ControlChar,
}

impl std::fmt::Display for NameProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameProblem::Empty => write!(f, "name must not be empty"),
            NameProblem::Reserved => write!(f, "`.` and `..` are reserved"),
            NameProblem::TooLong => write!(f, "name exceeds {} bytes", MAX_NAME_LEN),
            NameProblem::ForbiddenChar(c) => write!(
                f,
                "name must not contain `{}` (forbidden: \\ / : * ? \" < > |)",
                c
            ),
            NameProblem::ControlChar => write!(f, "name must not contain control characters"),
        }
    }
}

/// Check a user-supplied folder name or rename target. Expects a trimmed name.
pub fn validate_name(name: &str) -> Result<(), NameProblem> {
    if name.is_empty() {
        return Err(NameProblem::Empty);
    }
    if name == "." || name == ".." {
        return Err(NameProblem::Reserved);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameProblem::TooLong);
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(NameProblem::ForbiddenChar(c));
    }
    if name.chars().any(char::is_control) {
        return Err(NameProblem::ControlChar);
    }
    Ok(())
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Works per character, so the result has as many characters as the input.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Normalize a folder path: leading and trailing `/`, no empty segments.
///
/// `""`, `"/"` and `"//"` all become `/`; `"a//b"` becomes `/a/b/`.
pub fn normalize_folder_path(raw: &str) -> String {
    let mut out = String::from(ROOT);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        out.push_str(segment);
        out.push('/');
    }
    out
}

/// Normalize an entry path without forcing it to be a folder.
///
/// A trailing `/` is kept if present, so folder paths round-trip.
pub fn normalize_entry_path(raw: &str) -> String {
    let folder = normalize_folder_path(raw);
    if raw.ends_with('/') || folder == ROOT {
        folder
    } else {
        folder.trim_end_matches('/').to_string()
    }
}

/// Path of a child folder named `name` under `parent`.
pub fn folder_path(parent: &str, name: &str) -> String {
    format!("{}{}/", parent, name)
}

/// Path of a child file named `name` under `parent`.
pub fn file_path(parent: &str, name: &str) -> String {
    format!("{}{}", parent, name)
}

/// Blob-store key for a file path.
pub fn blob_key(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Rewrite `path` from the `old_base` prefix to `new_base`.
///
/// Returns `None` when `path` is not under `old_base`.
pub fn rebase(path: &str, old_base: &str, new_base: &str) -> Option<String> {
    path.strip_prefix(old_base)
        .map(|rest| format!("{}{}", new_base, rest))
}

/// One clickable step of a breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub path: String,
}

/// Breadcrumbs from the root down to `folder` (root itself excluded).
pub fn breadcrumbs(folder: &str) -> Vec<Breadcrumb> {
    let mut trail = Vec::new();
    let mut so_far = String::from(ROOT);
    for segment in folder.split('/').filter(|s| !s.is_empty()) {
        so_far.push_str(segment);
        so_far.push('/');
        trail.push(Breadcrumb {
            name: segment.to_string(),
            path: so_far.clone(),
        });
    }
    trail
}
