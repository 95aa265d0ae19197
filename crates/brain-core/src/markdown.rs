//! Minimal markdown-like formatting for brain responses.
//!
//! Not a parser: three ordered substitutions (line breaks, `**bold**`,
//! `*italic*`). Unclosed markers are left as literal text.

use regex::Regex;
use std::sync::OnceLock;

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*\*(.*?)\*\*").expect("valid bold pattern"))
}

fn italic_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\*(.*?)\*").expect("valid italic pattern"))
}

/// Render to HTML: newline → `<br>`, then bold, then italic.
pub fn to_html(text: &str) -> String {
    let broken = text.replace('\n', "<br>");
    let bold = bold_re().replace_all(&broken, "<strong>$1</strong>");
    italic_re().replace_all(&bold, "<em>$1</em>").into_owned()
}

/// A styled run of text within one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Bold(String),
    Italic(String),
}

/// Same substitutions as [`to_html`], split into lines of styled segments
/// for renderers that do not speak HTML. Markers are matched across line
/// breaks, so a bold run may span several lines.
pub fn to_segments(text: &str) -> Vec<Vec<Segment>> {
    let mut runs = Vec::new();
    let mut last = 0;
    for caps in bold_re().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        push_italics(&text[last..whole.start()], &mut runs);
        runs.push(Segment::Bold(caps[1].to_string()));
        last = whole.end();
    }
    push_italics(&text[last..], &mut runs);
    split_lines(runs)
}

fn split_lines(runs: Vec<Segment>) -> Vec<Vec<Segment>> {
    let mut lines: Vec<Vec<Segment>> = vec![Vec::new()];
    for run in runs {
        let (text, restyle): (String, fn(String) -> Segment) = match run {
            Segment::Plain(t) => (t, Segment::Plain),
            Segment::Bold(t) => (t, Segment::Bold),
            Segment::Italic(t) => (t, Segment::Italic),
        };
        for (i, piece) in text.split('\n').enumerate() {
            if i > 0 {
                lines.push(Vec::new());
            }
            if let Some(line) = lines.last_mut().filter(|_| !piece.is_empty()) {
                line.push(restyle(piece.to_string()));
            }
        }
    }
    lines
}

fn push_italics(text: &str, segments: &mut Vec<Segment>) {
    let mut last = 0;
    for caps in italic_re().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always present");
        if whole.start() > last {
            segments.push(Segment::Plain(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Italic(caps[1].to_string()));
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Plain(text[last..].to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_html_applies_all_three_substitutions() {
        assert_eq!(
            to_html("**a** *b*\nc"),
            "<strong>a</strong> <em>b</em><br>c"
        );
    }

    #[test]
    fn test_to_html_is_non_greedy() {
        assert_eq!(
            to_html("**x** and **y**"),
            "<strong>x</strong> and <strong>y</strong>"
        );
    }

    #[test]
    fn test_unclosed_markers_stay_literal() {
        assert_eq!(to_html("2 * 3"), "2 * 3");
        assert_eq!(
            to_segments("2 * 3"),
            vec![vec![Segment::Plain("2 * 3".into())]]
        );
    }

    #[test]
    fn test_segments_match_html_structure() {
        let lines = to_segments("**a** *b*\nc");
        assert_eq!(
            lines,
            vec![
                vec![
                    Segment::Bold("a".into()),
                    Segment::Plain(" ".into()),
                    Segment::Italic("b".into()),
                ],
                vec![Segment::Plain("c".into())],
            ]
        );
    }

    #[test]
    fn test_empty_line_has_no_segments() {
        assert_eq!(to_segments("a\n\nb")[1], Vec::<Segment>::new());
    }

    #[test]
    fn test_bold_spanning_line_break() {
        assert_eq!(to_html("**a\nb**"), "<strong>a<br>b</strong>");
        assert_eq!(
            to_segments("**a\nb** c"),
            vec![
                vec![Segment::Bold("a".into())],
                vec![Segment::Bold("b".into()), Segment::Plain(" c".into())],
            ]
        );
    }
}
