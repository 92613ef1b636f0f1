//! Question code parser
//!
//! A code has the exact shape `audq<NN><k>`: the literal prefix `audq`, a
//! two-digit audio number and one lowercase kind letter out of `k x f s m l`.
//! Anything else (case, digit count, trailing characters) is rejected.

use std::fmt;
use std::str::FromStr;

use crate::error::AllocError;

const PREFIX: &str = "audq";
const CODE_LEN: usize = PREFIX.len() + 3;

/// Question kind carried by the last letter of a code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    K,
    X,
    F,
    S,
    M,
    L,
}

impl QuestionKind {
    fn from_code_letter(letter: u8) -> Option<Self> {
        match letter {
            b'k' => Some(QuestionKind::K),
            b'x' => Some(QuestionKind::X),
            b'f' => Some(QuestionKind::F),
            b's' => Some(QuestionKind::S),
            b'm' => Some(QuestionKind::M),
            b'l' => Some(QuestionKind::L),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::K => "K",
            QuestionKind::X => "X",
            QuestionKind::F => "F",
            QuestionKind::S => "S",
            QuestionKind::M => "M",
            QuestionKind::L => "L",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed question code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCode {
    audio_number: String,
    kind: QuestionKind,
}

impl AudioCode {
    /// Two-digit audio number, e.g. `"07"`
    pub fn audio_number(&self) -> &str {
        &self.audio_number
    }

    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    /// Basename of the audio file this code selects
    pub fn file_name(&self) -> String {
        format!("{}.mp3", self.audio_number)
    }
}

/// Parse a question code
pub fn parse(code: &str) -> Result<AudioCode, AllocError> {
    let invalid = || AllocError::InvalidCode(code.to_string());

    let bytes = code.as_bytes();
    if bytes.len() != CODE_LEN || !code.starts_with(PREFIX) {
        return Err(invalid());
    }

    let digits = &bytes[PREFIX.len()..PREFIX.len() + 2];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }

    let kind = QuestionKind::from_code_letter(bytes[CODE_LEN - 1]).ok_or_else(invalid)?;

    Ok(AudioCode {
        // ASCII digits checked above, so this slice is on char boundaries
        audio_number: code[PREFIX.len()..PREFIX.len() + 2].to_string(),
        kind,
    })
}

impl FromStr for AudioCode {
    type Err = AllocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}
