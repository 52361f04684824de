//! # dirsync-core
//!
//! Core types shared by the dirsync crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and stable error codes
//! - [`config`] - Directory connection configuration
//! - [`types`] - Attribute value model

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::DirectoryConfig;
pub use error::{Error, Result, TransportError};
pub use types::{AttributeMap, AttributeValue};
