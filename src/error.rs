use std::fmt;

/// A non-fatal diagnostic. Collected by the driver, printed by the CLI shell
/// unless running in quiet mode.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "warning: line {}: {}", self.line, self.message)
    }
}

/// Category of a fatal assembly error, per the five buckets the driver can raise.
#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    Lexical(String),
    Syntax(String),
    Type(String),
    Resolution(String),
    Range(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Lexical(msg) => write!(f, "{}", msg),
            ErrorKind::Syntax(msg) => write!(f, "{}", msg),
            ErrorKind::Type(msg) => write!(f, "{}", msg),
            ErrorKind::Resolution(msg) => write!(f, "{}", msg),
            ErrorKind::Range(msg) => write!(f, "{}", msg),
        }
    }
}

/// A fatal parse/assemble error. Always carries the 1-based source line of the
/// offending token.
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub line: u32,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(line: u32, kind: ErrorKind) -> Error {
        Error { line, kind }
    }

    pub fn lexical(line: u32, message: impl Into<String>) -> Error {
        Error::new(line, ErrorKind::Lexical(message.into()))
    }

    pub fn syntax(line: u32, message: impl Into<String>) -> Error {
        Error::new(line, ErrorKind::Syntax(message.into()))
    }

    pub fn type_error(line: u32, message: impl Into<String>) -> Error {
        Error::new(line, ErrorKind::Type(message.into()))
    }

    pub fn resolution(line: u32, message: impl Into<String>) -> Error {
        Error::new(line, ErrorKind::Resolution(message.into()))
    }

    pub fn range(line: u32, message: impl Into<String>) -> Error {
        Error::new(line, ErrorKind::Range(message.into()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error: line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
