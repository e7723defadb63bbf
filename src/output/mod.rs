//! Result output
//!
//! - `text`: console summary
//! - `json`: report file

pub mod json;
pub mod text;
