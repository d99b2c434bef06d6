use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a conversion run. Per-game problems never surface here;
/// they are collected in an [`ErrorAccumulator`] on the game's report.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid starting position '{fen}': {reason}")]
    InvalidPosition { fen: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("malformed training record in '{path}': {reason}")]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("output writer stopped before the input was exhausted")]
    WriterGone,
}

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_single_message() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("illegal move 'Kxe9'");

        assert_eq!(accumulator.take().as_deref(), Some("illegal move 'Kxe9'"));
    }

    #[test]
    fn test_push_multiple_messages_uses_separator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("ply 3: no %eval");
        accumulator.push("ply 7: no %eval");

        assert_eq!(
            accumulator.as_deref(),
            Some("ply 3: no %eval; ply 7: no %eval")
        );
    }

    #[test]
    fn test_take_consumes_accumulator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("error");

        assert_eq!(accumulator.take().as_deref(), Some("error"));
        assert!(accumulator.is_empty());
        assert!(accumulator.take().is_none());
    }

    #[test]
    fn test_io_error_message_names_path() {
        let err = ConvertError::io(
            "games.pgn",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(err.to_string(), "I/O error on 'games.pgn': missing");
    }
}
