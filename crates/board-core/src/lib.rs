//! Core types for the live department board.
//!
//! Holds the machine/department data model, the error taxonomy, settings,
//! the notification sink and display formatting shared by every other crate.

pub mod error;
pub mod formatting;
pub mod models;
pub mod notifications;
pub mod settings;

pub use error::{BoardError, ErrorKind, Result};
