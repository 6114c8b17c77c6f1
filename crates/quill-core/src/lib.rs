//! # Quill Core
//!
//! The domain layer of Quill, a small blogging backend.
//! This crate contains pure business logic with zero infrastructure dependencies:
//! username derivation, the account lifecycle and post ownership rules.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;
pub mod username;

pub use error::DomainError;
