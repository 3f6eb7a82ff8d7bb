//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `command` is the pure room state machine, `snapshot` renders the public
//! view of a room, and `room` owns the registry, locking, and fan-out so
//! route handlers stay focused on protocol translation.

pub mod command;
pub mod room;
pub mod snapshot;
