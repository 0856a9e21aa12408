//! Definition of a ring buffer of commands.

use crate::{Command, RingError};
use std::cmp::min;

/// Number of commands retained by a default [`CommandRing`].
pub const RING_CAPACITY: usize = 10;

/// Location of a byte inside a resident command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Index of the command, counted from the oldest resident command.
    pub index: usize,

    /// Offset of the byte within that command.
    pub offset: usize,
}

/// Outcome of committing a command into a [`CommandRing`].
#[derive(Debug)]
pub struct Committed {
    /// Sequence number of the committed command.
    pub seq_no: u64,

    /// Oldest command, if it had to be evicted to make space.
    pub evicted: Option<Command>,
}

// Physical slot in a ring of N slots.
// Only the ring creates cursors, so they are always < N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor<const N: usize>(usize);

impl<const N: usize> Cursor<N> {
    #[inline]
    fn get(self) -> usize {
        self.0
    }

    #[inline]
    fn advance(self) -> Self {
        self.offset(1)
    }

    #[inline]
    fn offset(self, by: usize) -> Self {
        Self((self.0 + by % N) % N)
    }
}

/// A fixed capacity ring buffer of [`Command`]s.
///
/// Works pretty much like any other ring buffer, few differences:
/// * Holds variable length commands, each one owned by exactly one slot.
/// * When full, the oldest command is evicted before the newest is installed.
/// * Commands can be addressed by a linear byte offset, as if all resident
///   commands were concatenated, or by command index and offset within it.
#[derive(Debug)]
pub struct CommandRing<const N: usize = RING_CAPACITY> {
    // Storage for resident commands.
    slots: [Option<Command>; N],

    // Slot of the oldest resident command.
    read: Cursor<N>,

    // Slot where the next commit will be installed.
    write: Cursor<N>,

    // Number of resident commands. Empty and full rings have read == write,
    // so occupancy is tracked by count rather than cursor equality.
    length: usize,

    // Number of commands ever committed.
    committed: u64,
}

impl<const N: usize> Default for CommandRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CommandRing<N> {
    /// Create a new, empty ring buffer.
    ///
    /// # Panic
    ///
    /// * Ring buffer must have at least one slot.
    #[track_caller]
    pub fn new() -> Self {
        assert!(N > 0, "A Ring must have at least 1 slot");

        Self {
            slots: std::array::from_fn(|_| None),
            read: Cursor::default(),
            write: Cursor::default(),
            length: 0,
            committed: 0,
        }
    }

    /// Maximum number of resident commands.
    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    /// Number of resident commands.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.length == N
    }

    /// Number of commands ever committed, including evicted ones.
    #[inline]
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Commit a new command into the ring buffer.
    ///
    /// If the ring buffer is full, the oldest command is released and returned
    /// before the new command is installed. Cannot fail.
    ///
    /// # Arguments
    ///
    /// * `command` - Command to commit.
    pub fn commit(&mut self, command: Command) -> Committed {
        // Reclaim the oldest slot, it is also the slot we are about to write to.
        let evicted = if self.is_full() {
            let evicted = self.slots[self.read.get()].take();
            self.read = self.read.advance();
            self.length -= 1;
            evicted
        } else {
            None
        };

        // Install the new command in the now vacant slot.
        let previous = self.slots[self.write.get()].replace(command);
        debug_assert!(previous.is_none(), "Write slot must be vacant");
        self.write = self.write.advance();
        self.length += 1;

        let seq_no = self.committed;
        self.committed += 1;

        Committed { seq_no, evicted }
    }

    /// An iterator over resident commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        (0..self.length).filter_map(move |index| {
            let cursor = self.read.offset(index);
            self.slots[cursor.get()].as_ref()
        })
    }

    /// Sum of lengths of all resident commands.
    pub fn total_linear_length(&self) -> usize {
        self.iter().map(Command::len).sum()
    }

    /// Find the command that holds a byte at some linear offset.
    ///
    /// Linear offset 0 is the first byte of the oldest resident command. Returns
    /// `None` if the offset is at or past the end of resident commands.
    ///
    /// # Arguments
    ///
    /// * `offset` - Linear offset of the byte.
    pub fn find_by_linear_offset(&self, offset: usize) -> Option<(Position, &Command)> {
        let mut start = 0;
        for (index, command) in self.iter().enumerate() {
            let end = start + command.len();
            if offset < end {
                let position = Position {
                    index,
                    offset: offset - start,
                };

                return Some((position, command));
            }

            start = end;
        }

        None
    }

    /// Find a command by its index, counted from the oldest resident command.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the command.
    pub fn find_by_command_index(&self, index: usize) -> Result<&Command, RingError> {
        let invalid = RingError::InvalidIndex {
            index,
            len: self.length,
        };

        if index >= self.length {
            return Err(invalid);
        }

        self.slots[self.read.offset(index).get()]
            .as_ref()
            .ok_or(invalid)
    }

    /// Resolve a command index and an offset within it to a linear offset.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the command, counted from the oldest.
    /// * `offset` - Offset within the command.
    pub fn seek_to(&self, index: usize, offset: usize) -> Result<usize, RingError> {
        let command = self.find_by_command_index(index)?;
        if offset >= command.len() {
            return Err(RingError::InvalidOffset {
                offset,
                len: command.len(),
            });
        }

        let preceding: usize = self.iter().take(index).map(Command::len).sum();
        Ok(preceding + offset)
    }

    /// Copy bytes starting at a linear offset.
    ///
    /// Copying stops at the end of the command holding the offset or when `buf`
    /// is full, whichever comes first. Returns the number of bytes copied, 0 at
    /// the end of resident commands.
    ///
    /// # Arguments
    ///
    /// * `offset` - Linear offset to start copying from.
    /// * `buf` - Buffer to copy bytes into.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let Some((position, command)) = self.find_by_linear_offset(offset) else {
            return 0;
        };

        let src = &command[position.offset..];
        let count = min(src.len(), buf.len());
        buf[..count].copy_from_slice(&src[..count]);
        count
    }
}
