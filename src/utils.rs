//! Small text helpers shared by dataset loading and the workloads.
//!

/// Cleans one raw input line.
///
/// ASCII punctuation is removed and surrounding whitespace trimmed; a line
/// that is empty at that point is dropped ([`None`]). The survivor is then
/// lowercased and stripped of non-ASCII characters, which can leave it empty
/// (e.g. a line of only CJK text). Such lines are kept so they still count
/// towards the partitioner's line totals.
pub fn clean_line(raw: &str) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| !c.is_ascii_punctuation()).collect();
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase().chars().filter(char::is_ascii).collect())
}

/// Splits a cleaned line into tokens.
#[inline]
pub fn tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_case() {
        assert_eq!(clean_line("  Hello, World!\n").as_deref(), Some("hello world"));
        assert_eq!(clean_line("it's 2024.").as_deref(), Some("its 2024"));
    }

    #[test]
    fn blank_and_punctuation_only_lines_vanish() {
        assert_eq!(clean_line("   \n"), None);
        assert_eq!(clean_line("--- !!! ..."), None);
    }

    #[test]
    fn non_ascii_is_dropped() {
        assert_eq!(clean_line("Café naïve").as_deref(), Some("caf nave"));
    }

    #[test]
    fn non_ascii_only_lines_survive_empty() {
        assert_eq!(clean_line("日本語").as_deref(), Some(""));
        assert_eq!(clean_line(" «»… ").as_deref(), Some(""));
    }
}
