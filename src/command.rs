//! Definition of a command, the unit of data retained in a command log.

use std::ops::Deref;

/// Byte that marks the end of a command.
pub const TERMINATOR: u8 = b'\n';

/// An immutable, terminated sequence of bytes.
///
/// Commands are only ever created by an [`Accumulator`](crate::Accumulator) once it
/// observes a terminator, so the last byte of a command is always [`TERMINATOR`].
/// It follows that a command is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(Box<[u8]>);

impl Command {
    /// Freeze accumulated bytes into a command.
    ///
    /// # Invariants
    ///
    /// * Last byte of `bytes` is [`TERMINATOR`].
    ///
    /// # Arguments
    ///
    /// * `bytes` - Bytes of the command, including terminator.
    pub(crate) fn from_terminated(bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.last(), Some(&TERMINATOR));
        Self(bytes.into_boxed_slice())
    }

    /// Number of bytes in the command, including terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, a command holds at least its terminator.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bytes of the command, including terminator.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for Command {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for Command {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
