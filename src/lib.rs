//! # Cmdring
//!
//! Cmdring retains the most recent commands written to it in a bounded ring buffer.
//!
//! ## Command
//!
//! A [`Command`] is a run of bytes terminated by [`TERMINATOR`]. Producers write
//! arbitrary chunks of bytes, an [`Accumulator`] frames them into commands. A
//! command only becomes visible once its terminator was written.
//!
//! ## Ring
//!
//! A [`CommandRing`] retains the last [`RING_CAPACITY`] commands, evicting the
//! oldest one to admit a new one. Resident commands can be addressed in two ways:
//!
//! * Linear offset - Position in the concatenation of all resident commands.
//! * [`Position`] - Index of a command, counted from the oldest, and offset within it.
//!
//! A [`SharedRing`] guards a ring with a single lock so that many [`Session`]s can
//! read and write it concurrently. Sessions behave like open files, see
//! [`std::io::Read`], [`std::io::Write`] and [`std::io::Seek`].

pub(crate) mod accumulator;
pub(crate) mod command;
pub(crate) mod error;
pub(crate) mod ring;
pub(crate) mod session;
pub(crate) mod shared;

pub mod config;
pub mod server;

// Externally exposed types.
pub use accumulator::Accumulator;
pub use command::{Command, TERMINATOR};
pub use error::RingError;
pub use ring::{CommandRing, Committed, Position, RING_CAPACITY};
pub use session::Session;
pub use shared::SharedRing;
