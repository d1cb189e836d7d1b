#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{line}:{column}: expected {expected}, found {found}")]
    Syntax {
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },
    #[error("{line}:{column}: multiple definitions of {kind} `{name}`")]
    Duplicate {
        line: usize,
        column: usize,
        kind: &'static str,
        name: String,
    },
}

impl Error {
    /// Line and column (both 1-based) the error was detected at.
    pub fn position(&self) -> (usize, usize) {
        match *self {
            Error::Syntax { line, column, .. } | Error::Duplicate { line, column, .. } => {
                (line, column)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
