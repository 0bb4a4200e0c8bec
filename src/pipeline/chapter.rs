//! Chapter identity and deterministic output naming.

use crate::error::{PipelineError, Result};

/// A single chapter discovered from the input container's embedded
/// markers. Immutable after discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub index: usize,
    pub title: String,
    pub start: f64,
    pub end: f64,
}

impl Chapter {
    pub fn new(index: usize, title: String, start: f64, end: f64) -> Result<Self> {
        if !(end > start) {
            return Err(PipelineError::InvalidInput(format!(
                "chapter {index}: end ({end}) must be greater than start ({start})"
            )));
        }
        Ok(Self { index, title, start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Normalizes arbitrary text to lowercase ASCII-only with hyphens: runs of
/// non-alphanumeric characters become a single hyphen, and leading/trailing
/// hyphens are trimmed.
fn kebab_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// `format_chapter_filename(c)` is a pure function of `c.index` and
/// `c.title` (§8): `chapter-NN-<kebab-case-title>`, where `NN` is the
/// 1-based index zero-padded to 2 digits. `title_override`, when set (a
/// parsed `filename` command's value), replaces the title component only —
/// the chapter's own title is unaffected.
pub fn format_chapter_filename(chapter: &Chapter, title_override: Option<&str>) -> String {
    let title = title_override.unwrap_or(&chapter.title);
    format!("chapter-{:02}-{}", chapter.index + 1, kebab_case(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_rejects_non_positive_duration() {
        assert!(Chapter::new(0, "x".to_string(), 5.0, 5.0).is_err());
        assert!(Chapter::new(0, "x".to_string(), 5.0, 4.0).is_err());
    }

    #[test]
    fn filename_is_pure_function_of_index_and_title() {
        let c = Chapter::new(0, "Intro".to_string(), 0.0, 20.0).unwrap();
        assert_eq!(format_chapter_filename(&c, None), "chapter-01-intro");

        let c2 = Chapter::new(2, "Chapter 3".to_string(), 0.0, 20.0).unwrap();
        assert_eq!(format_chapter_filename(&c2, None), "chapter-03-chapter-3");
    }

    #[test]
    fn filename_override_replaces_title_only() {
        let c = Chapter::new(2, "Chapter 3".to_string(), 0.0, 20.0).unwrap();
        let name = format_chapter_filename(&c, Some("Custom Output Name"));
        assert_eq!(name, "chapter-03-custom-output-name");
        assert_eq!(c.title, "Chapter 3");
    }

    #[test]
    fn kebab_case_collapses_runs_of_punctuation() {
        let c = Chapter::new(0, "Hello,,,  World!!".to_string(), 0.0, 1.0).unwrap();
        assert_eq!(format_chapter_filename(&c, None), "chapter-01-hello-world");
    }
}
