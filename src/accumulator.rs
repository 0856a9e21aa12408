//! Definition of a per-producer buffer that frames commands out of partial writes.

use crate::{Command, RingError, TERMINATOR};

/// Collects bytes from a single producer until a terminator is observed.
///
/// An accumulator is never shared between producers, so it needs no locking.
/// Bytes only leave the accumulator as a complete [`Command`].
#[derive(Debug)]
pub struct Accumulator {
    pending: Vec<u8>,
    limit: usize,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::with_limit(usize::MAX)
    }
}

impl Accumulator {
    /// Create a new, empty accumulator bounded only by available memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty accumulator holding at most `limit` pending bytes.
    ///
    /// Growing past the limit fails the same way as running out of memory.
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum number of pending bytes, terminator included.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    /// Number of bytes waiting for a terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if there is no partial command.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Bytes waiting for a terminator.
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Append bytes to the partial command.
    ///
    /// Append is all or nothing. If memory for the new bytes cannot be reserved,
    /// [`RingError::AllocationFailure`] is returned and pending bytes are unchanged.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Bytes to append.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), RingError> {
        let error = RingError::AllocationFailure(bytes.len());
        match self.pending.len().checked_add(bytes.len()) {
            Some(len) if len <= self.limit => {}
            _ => return Err(error),
        }

        self.pending.try_reserve(bytes.len()).map_err(|_| error)?;

        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    /// Consume input up to and including the first terminator.
    ///
    /// * Without a terminator, all of `bytes` is appended and no command is produced.
    /// * With a terminator, pending bytes and the input prefix form a new command
    ///   and the accumulator is reset.
    ///
    /// Returns the produced command, if any, and the unconsumed rest of the input.
    /// The rest is the start of the next command and should be fed back in.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Input chunk from the producer.
    pub fn extract_terminated_prefix<'a>(
        &mut self,
        bytes: &'a [u8],
    ) -> Result<(Option<Command>, &'a [u8]), RingError> {
        let Some(index) = bytes.iter().position(|byte| *byte == TERMINATOR) else {
            self.append(bytes)?;
            return Ok((None, Default::default()));
        };

        let (prefix, rest) = bytes.split_at(index + 1);
        self.append(prefix)?;

        let command = Command::from_terminated(std::mem::take(&mut self.pending));
        Ok((Some(command), rest))
    }

    /// Frame every complete command out of an input chunk.
    ///
    /// Trailing bytes without a terminator stay pending for the next chunk.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Input chunk from the producer.
    pub fn drain_commands(&mut self, mut bytes: &[u8]) -> Result<Vec<Command>, RingError> {
        let mut commands = Vec::new();
        while !bytes.is_empty() {
            let (command, rest) = self.extract_terminated_prefix(bytes)?;
            commands.extend(command);
            bytes = rest;
        }

        Ok(commands)
    }
}
