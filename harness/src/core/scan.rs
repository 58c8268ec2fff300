//! Prompt-boundary detection over scraped terminal output.
//!
//! The tool prints a prompt, the response, then another prompt. Any line
//! containing `>` is treated as a prompt marker, which also matches ordinary
//! output lines that happen to contain `>`. That false positive is known and
//! accepted; [`classify_line`] is the single place the rule lives.
//!
//! Scanning always covers the whole buffer, so the result does not depend on
//! how the output was split into chunks.

use std::sync::LazyLock;

use regex::Regex;

/// Marker character identifying a prompt line.
pub const PROMPT_MARKER: char = '>';

/// Progress indicator lines excluded from extracted output.
pub const THINKING_MARKER: &str = "Thinking...";

static CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1F\x7F-\x9F]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    PromptMarker,
    Thinking,
    Content,
}

/// Classify a cleaned output line.
///
/// Marker detection wins over the thinking check.
pub fn classify_line(line: &str) -> LineKind {
    if line.contains(PROMPT_MARKER) {
        LineKind::PromptMarker
    } else if line.contains(THINKING_MARKER) {
        LineKind::Thinking
    } else {
        LineKind::Content
    }
}

/// Strip C0/C1 control characters and surrounding whitespace.
pub fn clean_line(line: &str) -> String {
    CONTROL_CHARS.replace_all(line, "").trim().to_string()
}

/// Split raw output into cleaned, non-empty lines.
///
/// The trailing line is included even without a terminating newline, since an
/// interactive prompt is usually left unterminated.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Transient state of one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PromptScan {
    pub seen_first_marker: bool,
    pub candidate_start: usize,
}

impl PromptScan {
    /// Feed the line at `index`. Returns the response once a later marker
    /// closes a non-empty candidate.
    ///
    /// An empty candidate leaves the state untouched, so the next marker
    /// re-reads from the original start (including the earlier marker line).
    pub fn step(&mut self, lines: &[String], index: usize) -> Option<String> {
        if classify_line(&lines[index]) != LineKind::PromptMarker {
            return None;
        }
        if !self.seen_first_marker {
            self.seen_first_marker = true;
            self.candidate_start = index + 1;
            return None;
        }

        let candidate: Vec<&str> = lines[self.candidate_start..index]
            .iter()
            .map(String::as_str)
            .filter(|line| !line.contains(THINKING_MARKER))
            .collect();
        if candidate.is_empty() {
            return None;
        }
        Some(candidate.join("\n").trim().to_string())
    }
}

/// Run the prompt heuristic over the full accumulated output.
pub fn extract_response(text: &str) -> Option<String> {
    let lines = split_lines(text);
    let mut scan = PromptScan::default();
    (0..lines.len()).find_map(|index| scan.step(&lines, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_marker_thinking_and_content() {
        assert_eq!(classify_line("project >"), LineKind::PromptMarker);
        assert_eq!(classify_line("Thinking..."), LineKind::Thinking);
        assert_eq!(classify_line("> Thinking..."), LineKind::PromptMarker);
        assert_eq!(classify_line("hello"), LineKind::Content);
    }

    #[test]
    fn clean_line_strips_c0_and_c1_controls() {
        assert_eq!(clean_line("\u{1b}[2Khello\r"), "[2Khello");
        assert_eq!(clean_line("  a\u{7f}b\u{85}c\u{9f}  "), "abc");
        assert_eq!(clean_line("tab\there"), "tabhere");
    }

    #[test]
    fn split_lines_drops_blank_and_control_only_lines() {
        let lines = split_lines("one\n\n   \n\u{1b}\n two \nthree");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn extracts_text_between_two_markers() {
        let text = "Welcome\nrepo > \nThe answer is 42\nrepo > ";
        assert_eq!(extract_response(text).as_deref(), Some("The answer is 42"));
    }

    #[test]
    fn single_marker_yields_nothing() {
        assert_eq!(extract_response("repo >\npartial answer\n"), None);
    }

    #[test]
    fn thinking_lines_are_filtered_from_output() {
        let text = ">\nThinking...\nfirst\nThinking...\nsecond\n>";
        assert_eq!(extract_response(text).as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn only_thinking_between_markers_keeps_scanning() {
        // The second marker closes an empty candidate. State is not reset, so
        // the third marker sees everything after the first one.
        let text = "> \nThinking...\n> \nanswer\n> ";
        assert_eq!(extract_response(text).as_deref(), Some(">\nanswer"));
    }

    #[test]
    fn prompt_with_spinner_is_not_a_response() {
        // The spinner line is itself a marker, but inside a candidate it is
        // still dropped as a thinking line.
        assert_eq!(extract_response("repo >\nrepo > Thinking...\nrepo >\n"), None);
        assert_eq!(
            extract_response("repo >\nrepo > Thinking...\nrepo >\ndone\nrepo >\n").as_deref(),
            Some("repo >\ndone")
        );
    }

    #[test]
    fn adjacent_markers_without_more_output_yield_nothing() {
        assert_eq!(extract_response(">\n>\n"), None);
    }

    #[test]
    fn carriage_returns_do_not_leak_into_output() {
        let text = "> \r\nline one\r\nline two\r\n> ";
        assert_eq!(extract_response(text).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn chunking_does_not_change_the_result() {
        let text = "boot\n> \nhello world\n> ";
        let whole = extract_response(text);

        let mut buffer = String::new();
        let mut first_hit = None;
        for ch in text.chars() {
            buffer.push(ch);
            if let Some(found) = extract_response(&buffer) {
                first_hit = Some(found);
                break;
            }
        }
        assert_eq!(first_hit, whole);
    }

    #[test]
    fn prompt_scan_records_first_marker_position() {
        let lines = split_lines("intro\n>\nbody");
        let mut scan = PromptScan::default();
        assert_eq!(scan.step(&lines, 0), None);
        assert!(!scan.seen_first_marker);
        assert_eq!(scan.step(&lines, 1), None);
        assert_eq!(
            scan,
            PromptScan {
                seen_first_marker: true,
                candidate_start: 2
            }
        );
    }
}
