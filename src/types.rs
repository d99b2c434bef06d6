use std::fmt;

/// Standard starting position, used when a game carries no `FEN` tag.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameResult {
    WhiteWon,
    BlackWon,
    Draw,
    #[default]
    Unknown,
}

impl GameResult {
    /// Parse a PGN result token. Anything that is not one of the three
    /// decided results (including `*`) is `Unknown`.
    pub fn from_pgn(raw: &str) -> Self {
        match raw.trim() {
            "1-0" => Self::WhiteWon,
            "0-1" => Self::BlackWon,
            "1/2-1/2" => Self::Draw,
            _ => Self::Unknown,
        }
    }

    pub fn as_pgn(self) -> &'static str {
        match self {
            Self::WhiteWon => "1-0",
            Self::BlackWon => "0-1",
            Self::Draw => "1/2-1/2",
            Self::Unknown => "*",
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pgn())
    }
}

/// One ply as written in the source game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveRecord {
    /// Move text as given; may still carry a move number, check/annotation
    /// suffixes or a trailing `{` comment fragment.
    pub text: String,
    pub comment: Option<String>,
    /// First Numeric Annotation Glyph attached to the move.
    pub nag: Option<u8>,
}

impl MoveRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            comment: None,
            nag: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_nag(mut self, nag: u8) -> Self {
        self.nag = Some(nag);
        self
    }
}

/// Parsed game handed to the replayer. Built once by the PGN visitor (or by
/// library callers) and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    pub event: Option<String>,
    pub result: GameResult,
    /// Starting FEN; `None` means the standard initial position.
    pub fen: Option<String>,
    pub moves: Vec<MoveRecord>,

    /// Reader-stage diagnostics; `None` for cleanly parsed games.
    pub parse_error: Option<String>,
}

impl GameRecord {
    pub fn new(result: GameResult, moves: Vec<MoveRecord>) -> Self {
        Self {
            result,
            moves,
            ..Self::default()
        }
    }

    pub fn with_fen(mut self, fen: impl Into<String>) -> Self {
        self.fen = Some(fen.into());
        self
    }

    pub fn starting_fen(&self) -> &str {
        match self.fen.as_deref().map(str::trim) {
            Some(fen) if !fen.is_empty() => fen,
            _ => STARTPOS_FEN,
        }
    }
}
