//! Error signals shared by the tree, its cursors and the chained map.

use thiserror::Error;

/// Every failure a container operation can report.
///
/// Lookup failures (`KeyNotFound`) are routinely caught by higher layers
/// that only need an existence check; the rest are meant for the caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Error)]
pub enum Error {
    #[error("key not found")]
    KeyNotFound,
    #[error("key already exists")]
    KeyAlreadyExists,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("required buffer is missing")]
    NullArgument,
    #[error("cursor moved past the end of the tree")]
    IteratorPastEnd,
    #[error("cursor is at the root and has no parent")]
    IteratorAtRoot,
}

pub type Result<T> = core::result::Result<T, Error>;
