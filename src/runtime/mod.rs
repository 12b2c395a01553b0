//! Capture engine and inference client.
//!
//! `supervisor` runs the command and drives one `pump` per stream; each pump
//! relays bytes and feeds a `ring_buffer`. After exit, `excerpt` turns the
//! buffers into bounded text, `analyzer` gates and times the single call made
//! through `client`, and `wrapper` ties the steps together.

pub mod analyzer;
pub mod client;
pub mod detect;
pub mod excerpt;
pub mod prompt;
pub mod pump;
pub mod ring_buffer;
pub mod supervisor;
pub mod wrapper;
