//! Move annotations: Numeric Annotation Glyphs and inline `%eval` tags.

use std::sync::LazyLock;

/// Saturating raw score used for forced-mate annotations.
pub const MATE_SCORE: f32 = 128.0;

static EVAL_NUMERIC_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\[%eval (-?\d+(?:\.\d+)?)\]").expect("valid numeric eval regex")
});

static EVAL_MATE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\[%eval #(-?\d+)\]").expect("valid mate eval regex"));

/// What a move's glyph and comment say about it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Annotation {
    pub is_bad_move: bool,
    /// Pawn-unit engine score, or `±MATE_SCORE` for a forced mate.
    pub raw_score: Option<f32>,
    /// Whether a comment was attached at all.
    pub has_comment: bool,
}

pub fn interpret(nag: Option<u8>, comment: Option<&str>) -> Annotation {
    let comment = comment.map(str::trim).filter(|c| !c.is_empty());
    Annotation {
        is_bad_move: nag.is_some_and(is_bad_nag),
        raw_score: comment.and_then(extract_eval),
        has_comment: comment.is_some(),
    }
}

/// `$2` poor, `$4` very poor, `$5` speculative, `$6` dubious.
pub fn is_bad_nag(nag: u8) -> bool {
    matches!(nag, 2 | 4 | 5 | 6)
}

/// Parse a glyph as written in movetext: `$n`, a bare number, or one of the
/// traditional suffix annotations.
pub fn parse_glyph(text: &str) -> Option<u8> {
    let text = text.trim();
    match text {
        "!" => Some(1),
        "?" => Some(2),
        "!!" => Some(3),
        "??" => Some(4),
        "!?" => Some(5),
        "?!" => Some(6),
        _ => text.strip_prefix('$').unwrap_or(text).parse().ok(),
    }
}

/// Glyph written as a suffix of the move text itself (`Qh5??`), for records
/// that carry no separate NAG.
pub fn suffix_glyph(move_text: &str) -> Option<u8> {
    let text = move_text.split('{').next().unwrap_or(move_text).trim_end();
    let san = text.trim_end_matches(['!', '?']);
    parse_glyph(&text[san.len()..])
}

/// Find the first `[%eval x]` or `[%eval #n]` tag in a comment.
///
/// Numeric tags win over mate tags when both are present. A tag whose number
/// does not parse to a finite value counts as no score.
pub fn extract_eval(comment: &str) -> Option<f32> {
    if let Some(caps) = EVAL_NUMERIC_RE.captures(comment) {
        return caps[1].parse::<f32>().ok().filter(|v| v.is_finite());
    }

    let caps = EVAL_MATE_RE.captures(comment)?;
    let mate = &caps[1];
    // "#0" is not a meaningful mate distance but still signals a decided game
    mate.parse::<i64>().ok()?;
    Some(if mate.starts_with('-') {
        -MATE_SCORE
    } else {
        MATE_SCORE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_numeric_eval() {
        assert_eq!(extract_eval("[%eval 0.45]"), Some(0.45));
        assert_eq!(extract_eval("[%eval -1.5] [%clk 0:03:00]"), Some(-1.5));
        assert_eq!(extract_eval("[%clk 0:03:00] [%eval 12]"), Some(12.0));
    }

    #[test]
    fn test_extract_mate_eval() {
        assert_eq!(extract_eval("[%eval #3]"), Some(128.0));
        assert_eq!(extract_eval("[%eval #-3]"), Some(-128.0));
        assert_eq!(extract_eval(" [%eval #12] [%clk 0:00:05]"), Some(128.0));
    }

    #[test]
    fn test_extract_eval_absent() {
        assert_eq!(extract_eval("best by test"), None);
        assert_eq!(extract_eval("[%clk 1:30:43]"), None);
        assert_eq!(extract_eval(""), None);
    }

    #[test]
    fn test_extract_eval_malformed_is_no_score() {
        assert_eq!(extract_eval("[%eval abc]"), None);
        assert_eq!(extract_eval("[%eval 1.]"), None);
        assert_eq!(extract_eval("[%eval #]"), None);
        assert_eq!(extract_eval("[%eval #99999999999999999999999]"), None);
    }

    #[test]
    fn test_bad_move_glyphs() {
        for nag in [2, 4, 5, 6] {
            assert!(is_bad_nag(nag), "nag {nag}");
        }
        for nag in [0, 1, 3, 7, 10, 21, 146] {
            assert!(!is_bad_nag(nag), "nag {nag}");
        }
    }

    #[test]
    fn test_parse_glyph_forms() {
        assert_eq!(parse_glyph("$4"), Some(4));
        assert_eq!(parse_glyph("$1"), Some(1));
        assert_eq!(parse_glyph("6"), Some(6));
        assert_eq!(parse_glyph("??"), Some(4));
        assert_eq!(parse_glyph("?!"), Some(6));
        assert_eq!(parse_glyph("$x"), None);
    }

    #[test]
    fn test_suffix_glyph() {
        assert_eq!(suffix_glyph("2. Qh5??"), Some(4));
        assert_eq!(suffix_glyph("Nf3!? {book}"), Some(5));
        assert_eq!(suffix_glyph("Qxf7+?!"), Some(6));
        assert_eq!(suffix_glyph("e4"), None);
        assert_eq!(suffix_glyph("Qh7#"), None);
    }

    #[test]
    fn test_interpret_combines_glyph_and_comment() {
        let very_poor = interpret(parse_glyph("$4"), None);
        assert!(very_poor.is_bad_move);
        assert_eq!(very_poor.raw_score, None);
        assert!(!very_poor.has_comment);

        let good = interpret(parse_glyph("$1"), Some("[%eval 0.45]"));
        assert!(!good.is_bad_move);
        assert_eq!(good.raw_score, Some(0.45));
        assert!(good.has_comment);

        let blank = interpret(None, Some("   "));
        assert!(!blank.has_comment);
    }
}
