use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Expression is empty")]
    Empty,

    #[error("Expression too long: {len} exceeds the limit of {max}")]
    TooLong { len: usize, max: usize },

    #[error("Invalid token: '{0}'")]
    InvalidToken(String),

    #[error("{what} {value} is out of range [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid modifier: {0}")]
    InvalidModifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("No single d20 term without drop/keep in '{0}'")]
    NoD20Term(String),

    #[error("Critical multiplier must be at least 1, got {0}")]
    InvalidMultiplier(u32),

    #[error("Unknown ability score method: '{0}'")]
    UnknownAbilityMethod(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RandomSourceError {
    #[error("Random source exhausted")]
    Exhausted,

    #[error("Random source produced {value}, outside [1, {max}]")]
    OutOfRange { value: u32, max: u32 },

    #[error("Random source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollError {
    #[error("Parse error - {0}")]
    Parse(#[from] ParseError),

    #[error("Evaluation error - {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Random source error - {0}")]
    RandomSource(#[from] RandomSourceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Empty,
    TooLong,
    InvalidToken,
    OutOfRange,
    InvalidModifier,
    NoD20Term,
    InvalidMultiplier,
    UnknownAbilityMethod,
    RandomSource,
}

impl RollError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RollError::Parse(e) => match e {
                ParseError::Empty => ErrorKind::Empty,
                ParseError::TooLong { .. } => ErrorKind::TooLong,
                ParseError::InvalidToken(_) => ErrorKind::InvalidToken,
                ParseError::OutOfRange { .. } => ErrorKind::OutOfRange,
                ParseError::InvalidModifier(_) => ErrorKind::InvalidModifier,
            },
            RollError::Evaluation(e) => match e {
                EvaluationError::NoD20Term(_) => ErrorKind::NoD20Term,
                EvaluationError::InvalidMultiplier(_) => ErrorKind::InvalidMultiplier,
                EvaluationError::UnknownAbilityMethod(_) => ErrorKind::UnknownAbilityMethod,
            },
            RollError::RandomSource(_) => ErrorKind::RandomSource,
        }
    }
}

/// The serializable form of a [`RollError`] carried by a roll outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&RollError> for OutcomeError {
    fn from(error: &RollError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RollError>;
