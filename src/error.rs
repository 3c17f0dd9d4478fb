//! Error types for maestream

use std::fmt;

/// Result type alias for maestream operations
pub type Result<T> = std::result::Result<T, MaeError>;

/// Error types that can occur while reading or writing Maestro files
#[derive(Debug)]
pub enum MaeError {
    /// I/O error
    Io(std::io::Error),

    /// Malformed Maestro grammar at a specific position
    Syntax {
        /// Line number where the error occurred (1-based)
        line: usize,
        /// Column number where the error occurred (1-based)
        column: usize,
        /// Error message
        message: String,
    },

    /// Cell contents cannot be interpreted for the declared column kind
    InvalidValue {
        /// Error message
        message: String,
    },

    /// Named block or property not found
    NotFound {
        /// The name that was looked up
        name: String,
    },

    /// Strict access to an undefined indexed-block cell
    UndefinedValue {
        /// Row of the undefined cell (0-based)
        row: usize,
    },

    /// Compression/decompression error
    Compression(String),
}

impl fmt::Display for MaeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaeError::Io(e) => write!(f, "I/O error: {}", e),
            MaeError::Syntax {
                line,
                column,
                message,
            } => {
                write!(f, "Line {}, column {}: {}", line, column, message)
            }
            MaeError::InvalidValue { message } => write!(f, "{}", message),
            MaeError::NotFound { name } => write!(f, "Key not found: {}", name),
            MaeError::UndefinedValue { row } => {
                write!(f, "Indexed property value undefined at row {}", row)
            }
            MaeError::Compression(msg) => write!(f, "Compression error: {}", msg),
        }
    }
}

impl std::error::Error for MaeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaeError {
    fn from(error: std::io::Error) -> Self {
        MaeError::Io(error)
    }
}
