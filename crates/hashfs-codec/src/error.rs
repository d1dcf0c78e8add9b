use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("too many blocks for the wire format: {0}")]
    TooManyBlocks(usize),

    #[error("block {index} hash is {actual} bytes, codec expects {expected}")]
    HashLength {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("object name is not valid UTF-8")]
    InvalidName,

    #[error("corrupt payload at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },

    #[error("no field layout matches the payload")]
    NoLayout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;
