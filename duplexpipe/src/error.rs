use core::fmt;

/// Category of a pipe error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The endpoint is not paired.
    NotReady,
    /// Write after `shutdown_write`.
    BrokenPipe,
    /// A ring buffer could not be allocated.
    AllocationFailure,
    /// One of the endpoints is already paired.
    AlreadyInUse,
    /// The endpoint id refers to a destroyed slot.
    StaleHandle,
    /// Bad pairing request, e.g. an endpoint paired with itself.
    InvalidArgument,
}

/// Error returned by pipe operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Error { kind }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::NotReady => write!(f, "Endpoint is not paired"),
            ErrorKind::BrokenPipe => write!(f, "Broken pipe"),
            ErrorKind::AllocationFailure => write!(f, "Failed to allocate pipe buffer"),
            ErrorKind::AlreadyInUse => write!(f, "Endpoint already in use"),
            ErrorKind::StaleHandle => write!(f, "Stale endpoint handle"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err.kind {
            ErrorKind::NotReady => std::io::ErrorKind::NotConnected,
            ErrorKind::BrokenPipe => std::io::ErrorKind::BrokenPipe,
            ErrorKind::AllocationFailure => std::io::ErrorKind::OutOfMemory,
            ErrorKind::AlreadyInUse => std::io::ErrorKind::AddrInUse,
            ErrorKind::InvalidArgument => std::io::ErrorKind::InvalidInput,
            ErrorKind::StaleHandle => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result type of pipe operations.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_roundtrip() {
        let err: Error = ErrorKind::BrokenPipe.into();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
        assert_eq!(err, Error::new(ErrorKind::BrokenPipe));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::new(ErrorKind::NotReady).into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotConnected);

        let io: std::io::Error = Error::new(ErrorKind::BrokenPipe).into();
        assert_eq!(io.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
