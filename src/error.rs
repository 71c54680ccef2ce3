//! Crate-wide error type.

use core::fmt;

/// Broad classification of an [`Error`], used by callers that only care
/// about which precondition was violated.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// A length, capacity, or index argument was out of range.
    InvalidArgument,
    /// The call is not valid in the current state of the object.
    InvalidOperation,
    /// The requested capacity exceeds `MAX_BUFFER_LENGTH`.
    ResourceExhausted,
    /// The object was disposed.
    Disposed,
    /// A required key was absent.
    NotFound,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidArgument(&'static str),
    CapacityOverflow { requested: usize },
    Disposed,
    DuplicateKey,
    KeyNotFound,
    /// Peek/pop on an empty container.
    Empty,
    /// The container was mutated after the cursor captured its version.
    VersionMismatch,
    /// `current` before the first `move_next`, or after exhaustion.
    NotPositioned,
    /// A cursor was driven with a container other than the one that made it.
    WrongOwner,
    MalformedBuffer { length: usize },
    ForeignBuffer,
    UnsupportedAlternate { type_name: &'static str },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::CapacityOverflow { .. } => ErrorKind::ResourceExhausted,
            Error::Disposed => ErrorKind::Disposed,
            Error::KeyNotFound => ErrorKind::NotFound,
            Error::DuplicateKey
            | Error::Empty
            | Error::VersionMismatch
            | Error::NotPositioned
            | Error::WrongOwner
            | Error::MalformedBuffer { .. }
            | Error::ForeignBuffer
            | Error::UnsupportedAlternate { .. } => ErrorKind::InvalidOperation,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            Error::CapacityOverflow { requested } => {
                write!(f, "requested capacity {requested} exceeds the maximum buffer length")
            }
            Error::Disposed => f.write_str("object has been disposed"),
            Error::DuplicateKey => f.write_str("an entry with the same key already exists"),
            Error::KeyNotFound => f.write_str("the given key was not present"),
            Error::Empty => f.write_str("collection is empty"),
            Error::VersionMismatch => {
                f.write_str("collection was modified; enumeration operation may not execute")
            }
            Error::NotPositioned => {
                f.write_str("enumeration has either not started or has already finished")
            }
            Error::WrongOwner => f.write_str("cursor belongs to a different collection"),
            Error::MalformedBuffer { length } => {
                write!(f, "buffer of length {length} does not belong to any size class")
            }
            Error::ForeignBuffer => f.write_str("buffer was rented from a different pool"),
            Error::UnsupportedAlternate { type_name } => {
                write!(f, "comparer does not support alternate key type `{type_name}`")
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_error_table() {
        assert_eq!(Error::InvalidArgument("index").kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Error::CapacityOverflow { requested: usize::MAX }.kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(Error::Disposed.kind(), ErrorKind::Disposed);
        assert_eq!(Error::DuplicateKey.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::VersionMismatch.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::MalformedBuffer { length: 3 }.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::KeyNotFound.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn display_mentions_details() {
        let msg = Error::MalformedBuffer { length: 17 }.to_string();
        assert!(msg.contains("17"));
        let msg = Error::UnsupportedAlternate { type_name: "f64" }.to_string();
        assert!(msg.contains("f64"));
    }
}
