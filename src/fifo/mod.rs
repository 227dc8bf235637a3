// src/fifo/mod.rs

//! Named-pipe (FIFO) side channel.
//!
//! An optional bidirectional channel the runner can attach for out-of-band
//! messaging with the child, independent of its stdin/stdout/stderr:
//!
//! - the path must name a pre-existing FIFO special file (or at least an
//!   openable read/write file); the channel never creates it,
//! - incoming data is detected through a filesystem watch on that single
//!   path,
//! - the channel's own writes are suppressed with an "ignore the next N
//!   notifications" counter, so only genuinely external writers trigger
//!   read events.

pub mod channel;

pub use channel::FifoChannel;
