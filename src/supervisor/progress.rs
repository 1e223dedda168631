//! Progress line detection.
//!
//! The external tool has no structured progress protocol; the plugins that
//! preceded this CLI keyed off a fixed vocabulary in its log output, and
//! that vocabulary is kept here as a compatibility surface.

/// Substrings (matched case-insensitively) that mark a line as progress
/// output rather than general chatter.
pub const PROGRESS_KEYWORDS: &[&str] =
    &["processing", "frame", "calculating", "trimming", "saving"];

/// True when `line` contains any progress keyword, ignoring case.
pub fn is_progress_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    PROGRESS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_keywords_case_insensitively() {
        assert!(is_progress_line("Processing frame 12 of 100"));
        assert!(is_progress_line("SAVING grid to disk"));
        assert!(is_progress_line("now calculating hydrophobic field"));
        assert!(is_progress_line("Trimming box"));
    }

    #[test]
    fn ignores_general_output() {
        assert!(!is_progress_line("Smiffer v2.1 starting up"));
        assert!(!is_progress_line(""));
        assert!(!is_progress_line("wrote log file"));
    }

    #[test]
    fn keyword_may_appear_mid_word() {
        // Substring match, same as the original heuristic: "reframe" counts.
        assert!(is_progress_line("reframe step complete"));
    }
}
