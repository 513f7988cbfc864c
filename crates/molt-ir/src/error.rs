use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    EmptyDescriptor,
    InvalidDescriptor(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyDescriptor => write!(f, "empty type descriptor"),
            Error::InvalidDescriptor(desc) => write!(f, "invalid type descriptor: {desc}"),
        }
    }
}

impl std::error::Error for Error {}
