use std::fmt;
use std::io;

/// Builds an [`Error`] variant that carries a formatted message.
macro_rules! err {
    ($variant:ident, $($arg:tt)*) => {
        crate::errors::Error::$variant(format!($($arg)*))
    };
}

/// Everything that can go wrong between the prompt and the disk.
///
/// Input and execution errors are recoverable: the REPL reports them and
/// keeps reading. Fatal errors propagate to `main`, which prints the
/// diagnostic and exits non-zero.
#[derive(Debug)]
pub enum Error {
    /// Underlying file I/O failure.
    Io(io::Error),
    /// The database file violates the on-disk format.
    Corrupt(String),
    /// A storage invariant was broken, e.g. a page number out of range or a
    /// flush of an unloaded page slot.
    Storage(String),
    /// A condition the engine declares out of scope.
    Unsupported(String),
    /// The statement could not be parsed.
    Syntax(String),
    /// Input that is not a known statement.
    Unrecognized(String),
    /// `insert` with a negative id.
    NegativeId,
    /// `insert` with an over-long username or email.
    StringTooLong,
    /// `insert` with a key the table already holds.
    DuplicateKey,
    /// Reserved result code; the B+ tree never reports it.
    TableFull,
}

impl Error {
    /// True for errors that must abort the process rather than be reported
    /// at the prompt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Corrupt(_) | Error::Storage(_) | Error::Unsupported(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error. {}", e),
            Error::Corrupt(msg) => write!(f, "Corrupt database file. {}", msg),
            Error::Storage(msg) => write!(f, "Storage error. {}", msg),
            Error::Unsupported(msg) => write!(f, "Unsupported. {}", msg),
            Error::Syntax(_) => write!(f, "Syntax error. Could not parse statement."),
            Error::Unrecognized(input) => {
                write!(f, "Unrecognized keyword at start of '{}'.", input)
            }
            Error::NegativeId => write!(f, "ID must be positive."),
            Error::StringTooLong => write!(f, "String is too long."),
            Error::DuplicateKey => write!(f, "Error: Duplicate Key."),
            Error::TableFull => write!(f, "Error: Table full."),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
