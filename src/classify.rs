//! Text-versus-binary classification.
//!
//! A file is decoded as text when its declared MIME type is `text/*` or
//! its name ends in one of the whitelisted extensions. Everything else is
//! recorded with the binary placeholder and its bytes are never read.

use std::collections::HashSet;

/// Extensions treated as text when no configuration overrides them.
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "js", "py", "html", "css", "json", "ts", "jsx", "tsx", "c", "cpp", "java", "cs",
];

/// The text-extension whitelist, matched case-insensitively.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    extensions: HashSet<String>,
}

impl TextClassifier {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether `name`'s extension is on the whitelist.
    pub fn has_text_extension(&self, name: &str) -> bool {
        let file_name = name.rsplit('/').next().unwrap_or(name);
        match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                self.extensions.contains(&ext.to_ascii_lowercase())
            }
            _ => false,
        }
    }

    /// Local classification: declared MIME type first, then the name.
    pub fn is_text(&self, mime_type: Option<&str>, name: &str) -> bool {
        mime_type.is_some_and(|m| m.starts_with("text/")) || self.has_text_extension(name)
    }
}

impl Default for TextClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_EXTENSIONS)
    }
}
