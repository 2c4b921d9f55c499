//! Result types for expect operations

mod error;

pub use error::ExpectError;
