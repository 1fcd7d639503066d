//! Path sanitization and canonical path assignment.
//!
//! Both providers hand us untrusted names: local directory entries and
//! repository paths. [`sanitize`] strips them to a safe character set;
//! [`PathClaims`] turns sanitized names into canonical paths that are
//! unique within one ingestion.

use std::collections::HashSet;

/// Remove every character outside `[A-Za-z0-9._\-/]`.
///
/// Total and idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(name: &str) -> String {
    name.chars().filter(|c| is_allowed(*c)).collect()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/')
}

/// Tracks the canonical paths issued during one ingestion.
///
/// Sanitization can map distinct names onto the same string (`a b.txt`
/// and `ab.txt`), and can leave degenerate segments (`..`, or nothing at
/// all for a name made entirely of disallowed characters). `claim` fixes
/// both so every record path is unique and safe to join.
#[derive(Debug, Default)]
pub struct PathClaims {
    issued: HashSet<String>,
}

impl PathClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize an already-sanitized path and reserve it.
    pub fn claim(&mut self, sanitized: &str) -> String {
        let base = normalize_segments(sanitized);
        if self.issued.insert(base.clone()) {
            return base;
        }

        let (stem, ext) = split_extension(&base);
        let mut n = 2u32;
        loop {
            let candidate = format!("{}-{}{}", stem, n, ext);
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

/// Map a sanitized name to a single safe segment (no `/`, never `.`/`..`/empty).
pub fn segment(name: &str) -> String {
    let s = sanitize(name).replace('/', "");
    match s.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => s,
    }
}

fn normalize_segments(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return "_".to_string();
    }
    parts
        .into_iter()
        .map(|p| match p {
            "." | ".." => "_",
            other => other,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Split `dir/name.ext` into (`dir/name`, `.ext`). Dotfiles have no extension.
fn split_extension(path: &str) -> (&str, &str) {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(0) | None => (path, ""),
        Some(i) => path.split_at(file_start + i),
    }
}
