//! Cadenza headless player
//!
//! Wires the playback core to the HTTP collaborators and a simulated
//! output so a remote collection can be played from a terminal.

pub mod config;
pub mod error;
pub mod session;
pub mod simulated;
