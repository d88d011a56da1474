use std::{fmt, io, path::PathBuf, string::FromUtf8Error};

use crate::diagnostic::Diagnostic;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read `{}`", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("`{}` is not valid UTF-8", .path.display())]
    Utf8 {
        path: PathBuf,
        source: FromUtf8Error,
    },
    #[error("failed to open `{}` for appending", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{stage} failed with {} error(s)", .diagnostics.len())]
    Compile {
        stage: Stage,
        diagnostics: Vec<Diagnostic>,
    },
}

impl Error {
    /// Located diagnostics carried by a compilation failure.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compile { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// Pipeline stage that rejected the unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexing,
    Recognition,
    CodeGeneration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Lexing => "lexing",
            Stage::Recognition => "recognition",
            Stage::CodeGeneration => "code generation",
        })
    }
}
