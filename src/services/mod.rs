//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `session` owns the one live session and is the only mutation surface.
//! The other modules are the pieces it is built from: tag text rules,
//! identity allocation, the consensus threshold, the expiry timer, and the
//! subscriber hub. Route handlers stay focused on protocol translation.

pub mod broadcast;
pub mod consensus;
pub mod identity;
pub mod lifecycle;
pub mod session;
pub mod tag;
