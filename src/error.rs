use thiserror::Error;

/// Failure to store a new element. The table is left exactly as it was.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum InsertError {
    #[error("out of memory: could not allocate {requested} bytes for element")]
    OutOfMemory { requested: usize },
}

/// No element with the given key exists in its bucket.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("key not found")]
pub struct KeyNotFound;
