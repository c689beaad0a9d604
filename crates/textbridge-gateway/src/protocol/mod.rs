//! Wire format types
//!
//! `chat` is the surface clients speak; `completion` is the raw text
//! continuation surface of the backend. Nothing here carries behavior beyond
//! small accessors.

pub mod chat;
pub mod completion;
