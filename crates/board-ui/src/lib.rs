//! Terminal UI for the live department board.
//!
//! Provides themes, the board screen (header with department aggregates,
//! machine cards on a layout surface, notice footer) and the event loop that
//! maps keys and mouse gestures onto board operations, built on [`ratatui`].

pub mod app;
pub mod board_view;
pub mod themes;

pub use board_core as core;
