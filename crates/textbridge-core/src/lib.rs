//! Shared building blocks for textbridge crates

mod error;

pub use error::HttpError;
