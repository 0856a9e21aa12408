//! Definition of a command ring that can be shared between sessions.

use crate::{Command, CommandRing, Committed, Position, RING_CAPACITY, RingError};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How long to wait for the lock before checking for cancellation again.
const LOCK_POLL: Duration = Duration::from_millis(10);

/// A [`CommandRing`] guarded by a single lock.
///
/// Every operation acquires the lock, runs to completion and releases it before
/// returning. The lock is never handed out, so it cannot be held across I/O.
/// Waiting for the lock can be abandoned through a [`CancellationToken`], in
/// which case [`RingError::Cancelled`] is returned and the ring is untouched.
///
/// Readers and writers contend on the same lock with no priority between them.
#[derive(Debug, Default)]
pub struct SharedRing<const N: usize = RING_CAPACITY> {
    ring: Mutex<CommandRing<N>>,
}

impl<const N: usize> SharedRing<N> {
    /// Create a new shared ring with no commands.
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(CommandRing::new()),
        }
    }

    /// Acquire exclusive access to the ring.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Abandons the wait when cancelled.
    fn lock(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, CommandRing<N>>, RingError> {
        loop {
            if cancel.is_cancelled() {
                trace!("Cancelled while waiting for ring");
                return Err(RingError::Cancelled);
            }

            if let Some(guard) = self.ring.try_lock_for(LOCK_POLL) {
                return Ok(guard);
            }
        }
    }

    /// Commit a command, evicting the oldest one if the ring is full.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Abandons the wait for the lock when cancelled.
    /// * `command` - Command to commit.
    pub fn commit(
        &self,
        cancel: &CancellationToken,
        command: Command,
    ) -> Result<Committed, RingError> {
        let committed = self.lock(cancel)?.commit(command);
        if let Some(evicted) = &committed.evicted {
            trace!(
                seq_no = committed.seq_no,
                evicted = evicted.len(),
                "Evicted oldest command"
            );
        }

        Ok(committed)
    }

    /// See [`CommandRing::find_by_linear_offset`].
    pub fn find_by_linear_offset(
        &self,
        cancel: &CancellationToken,
        offset: usize,
    ) -> Result<Option<Position>, RingError> {
        let ring = self.lock(cancel)?;
        Ok(ring.find_by_linear_offset(offset).map(|(position, _)| position))
    }

    /// See [`CommandRing::find_by_command_index`].
    ///
    /// Returns a copy of the command, the resident one stays owned by the ring.
    pub fn find_by_command_index(
        &self,
        cancel: &CancellationToken,
        index: usize,
    ) -> Result<Command, RingError> {
        self.lock(cancel)?.find_by_command_index(index).cloned()
    }

    /// See [`CommandRing::total_linear_length`].
    pub fn size(&self, cancel: &CancellationToken) -> Result<usize, RingError> {
        Ok(self.lock(cancel)?.total_linear_length())
    }

    /// Number of resident commands.
    pub fn len(&self, cancel: &CancellationToken) -> Result<usize, RingError> {
        Ok(self.lock(cancel)?.len())
    }

    /// See [`CommandRing::seek_to`].
    pub fn seek(
        &self,
        cancel: &CancellationToken,
        index: usize,
        offset: usize,
    ) -> Result<usize, RingError> {
        self.lock(cancel)?.seek_to(index, offset)
    }

    /// See [`CommandRing::read_at`].
    pub fn read_into(
        &self,
        cancel: &CancellationToken,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<usize, RingError> {
        Ok(self.lock(cancel)?.read_at(offset, buf))
    }

    /// Read up to `max_bytes` starting at a linear offset.
    ///
    /// Like [`SharedRing::read_into`], never reads past the end of the command
    /// holding the offset. An empty result means end of the log.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Abandons the wait for the lock when cancelled.
    /// * `offset` - Linear offset to start reading from.
    /// * `max_bytes` - Maximum number of bytes to return.
    pub fn read_from(
        &self,
        cancel: &CancellationToken,
        offset: usize,
        max_bytes: usize,
    ) -> Result<Vec<u8>, RingError> {
        let ring = self.lock(cancel)?;
        let Some((position, command)) = ring.find_by_linear_offset(offset) else {
            return Ok(Vec::new());
        };

        let src = &command[position.offset..];
        Ok(src[..std::cmp::min(src.len(), max_bytes)].to_vec())
    }
}
