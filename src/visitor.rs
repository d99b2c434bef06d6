use crate::error::ErrorAccumulator;
use crate::types::{GameRecord, GameResult, MoveRecord};
use pgn_reader::{Nag, Outcome, RawComment, RawTag, Reader, SanPlus, Skip, Visitor};
use smallvec::SmallVec;
use std::io::Read;
use std::mem;
use std::ops::ControlFlow;

type MoveList = SmallVec<[MoveRecord; 128]>;

/// Streaming PGN visitor (pgn-reader).
///
/// Collects the mainline as one [`MoveRecord`] per ply: the SAN as written,
/// the first NAG and every comment that follows the move (joined by a space).
/// Variations are skipped. Result comes from `outcome()` with the `Result`
/// tag as fallback.
pub struct GameVisitor {
    headers: HeaderFields,
    result_marker: Option<String>,
    parse_error: ErrorAccumulator,
    pub current_game: Option<GameRecord>,
}

#[derive(Default)]
struct HeaderFields {
    event: String,
    result: String,
    fen: String,
}

impl HeaderFields {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn opt_take(field: &mut String) -> Option<String> {
        if field.is_empty() {
            None
        } else {
            Some(mem::take(field))
        }
    }

    fn set_known_tag(&mut self, key: &[u8], value: RawTag<'_>) {
        let slot: &mut String = match key {
            b"Event" => &mut self.event,
            b"Result" => &mut self.result,
            b"FEN" => &mut self.fen,
            _ => return,
        };

        if !slot.is_empty() {
            return;
        }

        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return;
        }

        *slot = String::from_utf8_lossy(bytes).trim().to_string();
    }
}

impl Default for GameVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl GameVisitor {
    pub fn new() -> Self {
        Self {
            headers: HeaderFields::default(),
            result_marker: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }

    fn build_game_record(&mut self, moves: MoveList) {
        let result = self
            .result_marker
            .take()
            .or_else(|| HeaderFields::opt_take(&mut self.headers.result))
            .map_or(GameResult::Unknown, |raw| GameResult::from_pgn(&raw));

        self.current_game = Some(GameRecord {
            event: HeaderFields::opt_take(&mut self.headers.event),
            result,
            fen: HeaderFields::opt_take(&mut self.headers.fen),
            moves: moves.into_vec(),
            parse_error: self.parse_error.take(),
        });
    }

    /// Record a reader-stage failure and emit whatever was collected so far.
    pub fn finalize_game_with_error(&mut self, error_msg: String) {
        self.parse_error.push(&error_msg);
        self.build_game_record(MoveList::new());
    }
}

pub type PgnInput = Box<dyn Read + Send>;

pub struct PgnReaderState {
    pub pgn_reader: Reader<PgnInput>,
    pub path_idx: usize,
    pub next_game_index: usize,
    pub visitor: GameVisitor,
}

impl PgnReaderState {
    pub fn new(input: PgnInput, path_idx: usize) -> Self {
        Self {
            pgn_reader: Reader::new(input),
            path_idx,
            next_game_index: 1,
            visitor: GameVisitor::new(),
        }
    }
}

impl Visitor for GameVisitor {
    type Tags = ();
    type Movetext = MoveList;
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers.clear();
        self.result_marker = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        self.headers.set_known_tag(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(MoveList::new())
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        movetext.push(MoveRecord::new(san.to_string()));
        ControlFlow::Continue(())
    }

    fn nag(&mut self, movetext: &mut Self::Movetext, nag: Nag) -> ControlFlow<Self::Output> {
        if let Some(last) = movetext.last_mut() {
            last.nag.get_or_insert(nag.0);
        }
        ControlFlow::Continue(())
    }

    fn comment(
        &mut self,
        movetext: &mut Self::Movetext,
        comment: RawComment<'_>,
    ) -> ControlFlow<Self::Output> {
        // comments before the first move belong to no ply
        let Some(last) = movetext.last_mut() else {
            return ControlFlow::Continue(());
        };
        let text = String::from_utf8_lossy(comment.as_bytes());
        let text = text.trim();
        if text.is_empty() {
            return ControlFlow::Continue(());
        }

        match &mut last.comment {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => last.comment = Some(text.to_string()),
        }
        ControlFlow::Continue(())
    }

    fn outcome(
        &mut self,
        _movetext: &mut Self::Movetext,
        outcome: Outcome,
    ) -> ControlFlow<Self::Output> {
        self.result_marker = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        self.build_game_record(movetext);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pgn: &str) -> GameRecord {
        let mut reader = Reader::new(pgn.as_bytes());
        let mut visitor = GameVisitor::new();
        reader.read_game(&mut visitor).unwrap();
        visitor.current_game.expect("Should have parsed a game")
    }

    fn sans(game: &GameRecord) -> Vec<&str> {
        game.moves.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_visitor_basic_parsing() {
        let game = parse(
            r#"[Event "Test Game"]
[Site "Internet"]
[Result "1-0"]
1. e4 e5 2. Nf3 1-0"#,
        );

        assert_eq!(game.event.as_deref(), Some("Test Game"));
        assert_eq!(game.result, GameResult::WhiteWon);
        assert_eq!(game.fen, None);
        assert_eq!(sans(&game), vec!["e4", "e5", "Nf3"]);
        assert!(game.parse_error.is_none());
    }

    #[test]
    fn test_visitor_result_tag_fallback() {
        let game = parse(
            r#"[Result "0-1"]
1. e4 e5"#,
        );
        assert_eq!(game.result, GameResult::BlackWon);

        let game = parse("1. e4 e5 *");
        assert_eq!(game.result, GameResult::Unknown);
    }

    #[test]
    fn test_visitor_duplicate_headers_preserve_first_value() {
        let game = parse(
            r#"[Event "First Event"]
[Event "Second Event"]
1. e4 1-0"#,
        );
        assert_eq!(game.event.as_deref(), Some("First Event"));
    }

    #[test]
    fn test_visitor_fen_tag() {
        let game = parse(
            r#"[SetUp "1"]
[FEN "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"]
1. e4 Kd7 1/2-1/2"#,
        );
        assert_eq!(game.fen.as_deref(), Some("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"));
        assert_eq!(game.result, GameResult::Draw);
    }

    #[test]
    fn test_visitor_lichess_annotations() {
        let game = parse(
            r#"[Event "Lichess Annotations"]
1. d4 { [%eval 0.25] [%clk 1:30:43] } Nf6 { [%eval 0.22] } { [%clk 1:30:42] } 2. c4?! *"#,
        );

        assert_eq!(sans(&game), vec!["d4", "Nf6", "c4"]);
        assert_eq!(
            game.moves[0].comment.as_deref(),
            Some("[%eval 0.25] [%clk 1:30:43]")
        );
        assert_eq!(
            game.moves[1].comment.as_deref(),
            Some("[%eval 0.22] [%clk 1:30:42]")
        );
        assert_eq!(game.moves[2].nag, Some(6));
        assert_eq!(game.moves[2].comment, None);
    }

    #[test]
    fn test_visitor_first_nag_wins() {
        let game = parse("1. e4 $2 $1 e5 $4 *");
        assert_eq!(game.moves[0].nag, Some(2));
        assert_eq!(game.moves[1].nag, Some(4));
    }

    #[test]
    fn test_visitor_skips_variations_and_leading_comments() {
        let game = parse("{ opening comment } 1. e4 (1. d4 { sideline } d5) e5 { main } *");
        assert_eq!(sans(&game), vec!["e4", "e5"]);
        assert_eq!(game.moves[0].comment, None);
        assert_eq!(game.moves[1].comment.as_deref(), Some("main"));
    }

    #[test]
    fn test_visitor_check_suffix_is_kept_for_cleaning() {
        let game = parse("1. e4 f5 2. Qh5+ g6 *");
        assert_eq!(sans(&game), vec!["e4", "f5", "Qh5+", "g6"]);
    }

    #[test]
    fn test_visitor_error_finalization_sets_parse_error() {
        let mut visitor = GameVisitor::new();
        visitor.finalize_game_with_error("boom".to_string());

        let game = visitor.current_game.expect("Should have built a record");
        assert!(game.moves.is_empty());
        assert_eq!(game.parse_error.as_deref(), Some("boom"));
    }
}
