//! Cache path derivation.
//!
//! A variant is stored at `<dir of request path>/<sanitized query>.<file name>`.
//! The query becomes part of the file name and the directory layout of the
//! origin is preserved.
//!
//! Sanitizing is lossy (`.`, `=` and `&` all become `_`), so callers pass the
//! canonical query of a resolved [`TransformSpec`](super::TransformSpec) and
//! a cleaned path rather than raw request input.
//!
//! ```text
//! /photos/2024/cat.jpg?width=320&op=c2f&height=180
//!   -> op=c2f&w=320&h=180
//!   -> photos/2024/op_c2f_w_320_h_180.cat.jpg
//! ```

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Sanitized queries are cut to this many characters.
pub const MAX_QUERY_LEN: usize = 200;

/// Replacements applied to the request path, tried in order at each position.
const PATH_REPLACEMENTS: &[&str] = &[
    "../", "./", "..", "?", "&", "=", "#", ":", "*", "\"", "<", ">", "|", "\\",
];

/// Replacements applied to the query string. Separators are flattened too,
/// since the query ends up inside a single file name.
const QUERY_REPLACEMENTS: &[&str] = &[
    ".", "/", "?", "&", "=", "#", ":", "*", "\"", "<", ">", "|", "\\",
];

/// Relative location of a variant under the cache root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CachePath(PathBuf);

impl CachePath {
    /// Derive the cache path for a request path and its raw query string.
    ///
    /// The result is always relative and free of `..` components, so joining
    /// it onto the cache root never escapes the root.
    pub fn derive(path: &str, query: Option<&str>) -> Self {
        let sanitized = replace_all(path, PATH_REPLACEMENTS);

        let mut relative = PathBuf::new();
        for component in Path::new(&sanitized).components() {
            if let Component::Normal(part) = component {
                relative.push(part);
            }
        }

        let query = query
            .map(|q| replace_all(q, QUERY_REPLACEMENTS))
            .map(|q| q.chars().take(MAX_QUERY_LEN).collect::<String>())
            .unwrap_or_default();

        if !query.is_empty() {
            if let Some(file_name) = relative.file_name() {
                let prefixed = format!("{}.{}", query, file_name.to_string_lossy());
                relative.set_file_name(prefixed);
            }
        }

        Self(relative)
    }

    /// The relative path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume into the relative path.
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for CachePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for CachePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Replace every occurrence of the given patterns with `_`.
///
/// At each position the first matching pattern wins, scanning left to right.
fn replace_all(input: &str, patterns: &[&str]) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    'scan: while let Some(ch) = rest.chars().next() {
        for pattern in patterns {
            if let Some(tail) = rest.strip_prefix(pattern) {
                out.push('_');
                rest = tail;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    out
}

// =============================================================================
// Tests
// =============================================================================
