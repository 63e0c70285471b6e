//! Collaborator layer for the live department board.
//!
//! Provides the request/response API client, the push-event channel and the
//! WebSocket feed that fills it.

pub mod api;
pub mod events;
pub mod feed;

pub use board_core as core;
