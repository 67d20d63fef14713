use gix_hash::ObjectId;

/// Everything that can go wrong while parsing a pack stream.
///
/// Every variant is terminal: the parser never recovers from one of these,
/// it only ever unwinds through a single `?`-propagation boundary at
/// [`crate::Parser::parse`](crate::parser::Parser::parse).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("corrupt object at offset {offset}: {message}")]
    CorruptObject { offset: u64, message: String },
    #[error("input exhausted while reading {context}")]
    UnexpectedEnd { context: &'static str },
    #[error("object at offset {offset} has size {size}, exceeding the configured limit of {limit}")]
    TooLargeObject { offset: u64, size: u64, limit: u64 },
    #[error("object {id} collides with an existing object of the same id but different content")]
    CollisionDetected { id: ObjectId },
    #[error("thin pack base {id} could not be found in the local object store")]
    MissingObject { id: ObjectId },
    #[error("{count} delta(s) could not be resolved against any base")]
    UnresolvedDeltas { count: usize },
    #[error("parsing was cancelled")]
    Cancelled,
    #[error("object at offset {offset} failed structural validation: {message}")]
    InvalidObject { offset: u64, message: String },
    #[error("I/O error reading from the sink's database")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(offset: u64, message: impl Into<String>) -> Self {
        Error::CorruptObject {
            offset,
            message: message.into(),
        }
    }
}

/// A convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
