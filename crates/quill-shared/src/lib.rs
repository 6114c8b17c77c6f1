//! # Quill Shared
//!
//! Wire types of the HTTP API: request bodies, response bodies and the
//! problem-details error envelope.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
