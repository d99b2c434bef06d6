use crate::config::Compression;
use crate::error::ConvertError;
use crate::types::GameRecord;
use crate::visitor::{PgnInput, PgnReaderState};
use log::warn;
use std::fs::File;
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder as ZstdDecoder;

/// Expand input arguments into file paths. Arguments containing `*` or `?`
/// are glob patterns; anything else is taken as a single file.
pub fn expand_inputs<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>, ConvertError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.contains('*') || pattern.contains('?') {
            let entries = glob::glob(pattern).map_err(|e| ConvertError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            let before = paths.len();
            paths.extend(entries.filter_map(|entry| entry.ok()));
            if paths.len() == before {
                warn!("Input pattern '{pattern}' matched no files");
            }
        } else {
            paths.push(PathBuf::from(pattern));
        }
    }
    Ok(paths)
}

fn is_zstd(path: &Path, compression: Compression) -> bool {
    match compression {
        Compression::Zstd => true,
        Compression::Plain => false,
        Compression::Auto => path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zst")),
    }
}

fn open_input_stream(path: &Path, compression: Compression) -> Result<PgnInput, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;

    if is_zstd(path, compression) {
        ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|e| ConvertError::io(path, e))
    } else {
        Ok(Box::new(file))
    }
}

/// Games from a list of PGN files, in file order.
///
/// A file that cannot be opened is an error when it is the only input and a
/// warning otherwise. Parser failures inside a file are attached to the
/// affected game as `parse_error`.
pub struct PgnGames {
    paths: Vec<PathBuf>,
    compression: Compression,
    next_path_idx: usize,
    current: Option<PgnReaderState>,
}

impl PgnGames {
    pub fn new(paths: Vec<PathBuf>, compression: Compression) -> Self {
        Self {
            paths,
            compression,
            next_path_idx: 0,
            current: None,
        }
    }

    /// Games from in-memory PGN text.
    pub fn from_reader(input: PgnInput) -> Self {
        Self {
            paths: vec![PathBuf::from("<memory>")],
            compression: Compression::Plain,
            next_path_idx: 1,
            current: Some(PgnReaderState::new(input, 0)),
        }
    }

    fn acquire_reader(&mut self) -> Result<Option<PgnReaderState>, ConvertError> {
        loop {
            if let Some(reader) = self.current.take() {
                return Ok(Some(reader));
            }

            if self.next_path_idx >= self.paths.len() {
                return Ok(None);
            }
            let path_idx = self.next_path_idx;
            self.next_path_idx += 1;

            let path = &self.paths[path_idx];
            match open_input_stream(path, self.compression) {
                Ok(input_stream) => return Ok(Some(PgnReaderState::new(input_stream, path_idx))),
                Err(err) => {
                    if self.paths.len() == 1 {
                        return Err(err);
                    }
                    warn!("{err}");
                }
            }
        }
    }
}

enum ReadNextGameOutcome {
    GameReady(GameRecord),
    /// The reader failed; the partial game is returned and the rest of the
    /// file is abandoned.
    ReaderFailed(GameRecord),
    ReaderFinished,
}

fn read_next_game(reader: &mut PgnReaderState, source_path: &Path) -> ReadNextGameOutcome {
    let game_index = reader.next_game_index;

    match reader.pgn_reader.read_game(&mut reader.visitor) {
        Ok(Some(_)) => {
            reader.next_game_index += 1;
            match reader.visitor.current_game.take() {
                Some(game) => ReadNextGameOutcome::GameReady(game),
                None => ReadNextGameOutcome::ReaderFinished,
            }
        }
        Ok(None) => ReadNextGameOutcome::ReaderFinished,
        Err(error) => {
            reader.next_game_index += 1;
            let error_msg = format!(
                "Parser-stage error: stage=read_game; file='{}'; game_index={}; error={}",
                source_path.display(),
                game_index,
                error
            );
            warn!("{error_msg}");
            reader.visitor.finalize_game_with_error(error_msg);
            match reader.visitor.current_game.take() {
                Some(game) => ReadNextGameOutcome::ReaderFailed(game),
                None => ReadNextGameOutcome::ReaderFinished,
            }
        }
    }
}

impl Iterator for PgnGames {
    type Item = Result<GameRecord, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut reader = match self.acquire_reader() {
                Ok(Some(reader)) => reader,
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            };

            let source_path = &self.paths[reader.path_idx];
            match read_next_game(&mut reader, source_path) {
                ReadNextGameOutcome::GameReady(game) => {
                    self.current = Some(reader);
                    return Some(Ok(game));
                }
                ReadNextGameOutcome::ReaderFailed(game) => return Some(Ok(game)),
                // dropped here; the next file is opened on the next pass
                ReadNextGameOutcome::ReaderFinished => {}
            }
        }
    }
}
