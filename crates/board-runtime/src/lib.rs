//! Live department board runtime.
//!
//! Composes the roster reconciler, the stats aggregator, the layout engine
//! and the push-event subscription into a single [`board::Board`] owned by
//! the view that displays it.

pub mod board;
pub mod layout;
pub mod roster;
pub mod stats;
pub mod subscription;

pub use board::{Board, BoardConfig, DeleteConfirmation, LoadState, Navigation};
pub use board_core as core;
pub use board_data as data;
