//! Definition of a client session over a shared command ring.

use crate::{Accumulator, Command, RING_CAPACITY, RingError, SharedRing};
use std::{
    io::{self, Read, Seek, SeekFrom, Write},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A handle to a [`SharedRing`] owned by a single client.
///
/// A session behaves like an open file over the command log:
/// * Writes are framed into commands by the session's own [`Accumulator`].
/// * Reads advance a linear file position, one command at a time.
/// * Seeks can target a linear offset or a (command, offset) pair.
///
/// Cancelling the session's token abandons any operation waiting on the ring.
#[derive(Debug)]
pub struct Session<const N: usize = RING_CAPACITY> {
    ring: Arc<SharedRing<N>>,
    cancel: CancellationToken,
    accumulator: Accumulator,
    position: usize,
}

impl<const N: usize> Session<N> {
    /// Open a new session at linear offset 0.
    ///
    /// # Arguments
    ///
    /// * `ring` - Ring shared with other sessions.
    /// * `cancel` - Cancels pending operations of this session.
    pub fn new(ring: Arc<SharedRing<N>>, cancel: CancellationToken) -> Self {
        Self::with_accumulator(ring, cancel, Accumulator::new())
    }

    /// Open a new session that frames commands with the given accumulator.
    ///
    /// # Arguments
    ///
    /// * `ring` - Ring shared with other sessions.
    /// * `cancel` - Cancels pending operations of this session.
    /// * `accumulator` - Accumulator for partial commands, usually a bounded one.
    pub fn with_accumulator(
        ring: Arc<SharedRing<N>>,
        cancel: CancellationToken,
        accumulator: Accumulator,
    ) -> Self {
        Self {
            ring,
            cancel,
            accumulator,
            position: 0,
        }
    }

    /// Current linear offset of the session.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of bytes written that are still waiting for a terminator.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.accumulator.len()
    }

    /// Ingest bytes, committing every command they complete.
    ///
    /// Returns sequence numbers of newly committed commands, possibly none.
    /// If an error happens midway, commands framed before it remain committed.
    /// A command whose commit fails is discarded, as is the rest of `bytes`.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Bytes written by the client.
    pub fn submit(&mut self, bytes: &[u8]) -> Result<Vec<u64>, RingError> {
        let mut committed = Vec::new();
        self.ingest(bytes, &mut committed).map_err(|(_, error)| error)?;

        Ok(committed)
    }

    /// Frame and commit commands out of `input`.
    ///
    /// On error, returns how many bytes of `input` were consumed before the
    /// failing step, which is the end of the last committed command.
    fn ingest(
        &mut self,
        input: &[u8],
        committed: &mut Vec<u64>,
    ) -> Result<(), (usize, RingError)> {
        let mut bytes = input;
        while !bytes.is_empty() {
            let consumed = input.len() - bytes.len();
            let (command, rest) = self
                .accumulator
                .extract_terminated_prefix(bytes)
                .map_err(|error| (consumed, error))?;

            if let Some(command) = command {
                let seq_no = self.commit(command).map_err(|error| (consumed, error))?;
                committed.push(seq_no);
            }

            bytes = rest;
        }

        Ok(())
    }

    /// Commit a complete command, returning its sequence number.
    ///
    /// # Arguments
    ///
    /// * `command` - Command to commit.
    pub fn commit(&mut self, command: Command) -> Result<u64, RingError> {
        let len = command.len();
        let committed = self.ring.commit(&self.cancel, command)?;
        debug!(seq_no = committed.seq_no, len, "Committed command");
        Ok(committed.seq_no)
    }

    /// Move the session to a byte inside a resident command.
    ///
    /// Returns the new linear offset.
    ///
    /// # Arguments
    ///
    /// * `index` - Index of the command, counted from the oldest.
    /// * `offset` - Offset within the command.
    pub fn seek_to_command(&mut self, index: usize, offset: usize) -> Result<usize, RingError> {
        self.position = self.ring.seek(&self.cancel, index, offset)?;
        Ok(self.position)
    }

    /// Total length of the log.
    pub fn size(&self) -> Result<usize, RingError> {
        self.ring.size(&self.cancel)
    }
}

impl<const N: usize> Read for Session<N> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let copied = self.ring.read_into(&self.cancel, self.position, buf)?;
        self.position += copied;
        Ok(copied)
    }
}

impl<const N: usize> Write for Session<N> {
    /// Bytes after a terminator are consumed even without a terminator of their
    /// own, they wait in the accumulator for the next write.
    ///
    /// If ingestion fails after some commands were committed, only the bytes up
    /// to the last committed terminator are reported as written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut committed = Vec::new();
        match self.ingest(buf, &mut committed) {
            Ok(()) => Ok(buf.len()),
            Err((consumed, _)) if consumed > 0 => Ok(consumed),
            Err((_, error)) => Err(error.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<const N: usize> Seek for Session<N> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let size = self.size()? as u64;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => size.checked_add_signed(delta),
            SeekFrom::Current(delta) => (self.position as u64).checked_add_signed(delta),
        };

        match target {
            Some(target) if target <= size => {
                self.position = target as usize;
                Ok(target)
            }

            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Seek to {pos:?} outside of log of {size} bytes"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn session() -> Session<3> {
        Session::new(Arc::new(SharedRing::new()), CancellationToken::new())
    }

    #[test]
    fn submit_partial_then_rest() -> io::Result<()> {
        let mut session = session();

        assert_eq!(session.submit(b"partial")?, Vec::<u64>::new());
        assert_eq!(session.pending_len(), 7);
        assert_eq!(session.size()?, 0);

        assert_eq!(session.submit(b"rest\n")?, vec![0]);
        assert_eq!(session.pending_len(), 0);

        let mut contents = Vec::new();
        session.read_to_end(&mut contents)?;
        assert_eq!(contents, b"partialrest\n");

        Ok(())
    }

    #[test]
    fn submit_many_in_one_chunk() -> Result<(), RingError> {
        let mut session = session();
        assert_eq!(session.submit(b"a\nbb\nccc\ndddd\ntail")?, vec![0, 1, 2, 3]);
        assert_eq!(session.pending_len(), 4);
        assert_eq!(session.size()?, 12);
        Ok(())
    }

    #[test]
    fn sessions_share_the_ring() -> io::Result<()> {
        let ring = Arc::new(SharedRing::<3>::new());
        let mut writer = Session::new(Arc::clone(&ring), CancellationToken::new());
        let mut reader = Session::new(ring, CancellationToken::new());

        writer.write_all(b"hello\nworld\n")?;

        let mut contents = String::new();
        reader.read_to_string(&mut contents)?;
        assert_eq!(contents, "hello\nworld\n");
        assert_eq!(reader.position(), 12);
        assert_eq!(writer.position(), 0);

        Ok(())
    }

    #[test]
    fn read_stops_at_each_command() -> io::Result<()> {
        let mut session = session();
        session.write_all(b"one\ntwo\n")?;

        let mut buf = [0; 64];
        assert_eq!(session.read(&mut buf)?, 4);
        assert_eq!(session.read(&mut buf)?, 4);
        assert_eq!(&buf[..4], b"two\n");
        assert_eq!(session.read(&mut buf)?, 0);

        Ok(())
    }

    #[test]
    fn seek_to_command() -> io::Result<()> {
        let mut session = session();
        session.write_all(b"a\nbb\nccc\ndddd\n")?;

        assert_eq!(session.seek_to_command(2, 1)?, 8);

        let mut rest = Vec::new();
        session.read_to_end(&mut rest)?;
        assert_eq!(rest, b"ddd\n");

        // Failed seeks keep the position.
        let position = session.position();
        assert_eq!(
            session.seek_to_command(3, 0),
            Err(RingError::InvalidIndex { index: 3, len: 3 })
        );
        assert_eq!(
            session.seek_to_command(0, 3),
            Err(RingError::InvalidOffset { offset: 3, len: 3 })
        );
        assert_eq!(session.position(), position);

        Ok(())
    }

    #[rstest]
    #[case(SeekFrom::Start(0), Some(0))]
    #[case(SeekFrom::Start(9), Some(9))]
    #[case(SeekFrom::Start(10), None)]
    #[case(SeekFrom::End(0), Some(9))]
    #[case(SeekFrom::End(-4), Some(5))]
    #[case(SeekFrom::End(-10), None)]
    #[case(SeekFrom::End(1), None)]
    #[case(SeekFrom::Current(-2), Some(1))]
    #[case(SeekFrom::Current(6), Some(9))]
    #[case(SeekFrom::Current(-4), None)]
    fn seek(#[case] pos: SeekFrom, #[case] expected: Option<u64>) -> io::Result<()> {
        let mut session = session();
        session.write_all(b"a\nbb\nccc\n")?;
        session.seek(SeekFrom::Start(3))?;

        match (session.seek(pos), expected) {
            (Ok(offset), Some(expected)) => {
                assert_eq!(offset, expected);
                assert_eq!(session.position() as u64, expected);
            }

            (Err(error), None) => {
                assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
                assert_eq!(session.position(), 3);
            }

            (result, expected) => panic!("Unexpected result {result:?}, expected {expected:?}"),
        }

        Ok(())
    }

    #[test]
    fn write_reports_committed_prefix() -> io::Result<()> {
        let ring = Arc::new(SharedRing::<3>::new());
        let accumulator = Accumulator::with_limit(4);
        let mut session = Session::with_accumulator(ring, CancellationToken::new(), accumulator);

        // Second command does not fit, only the first one is written.
        assert_eq!(session.write(b"ab\ntoo long\n")?, 3);
        assert_eq!(session.size()?, 3);
        assert_eq!(session.pending_len(), 0);

        // Nothing committed, so the failure is reported.
        let error = session.write(b"too long\n").expect_err("Write should fail");
        assert_eq!(error.kind(), io::ErrorKind::OutOfMemory);

        // write_all surfaces the failure after the committed prefix.
        let error = session.write_all(b"c\nd\ntoo long\n").expect_err("Write should fail");
        assert_eq!(error.kind(), io::ErrorKind::OutOfMemory);
        assert_eq!(session.size()?, 7);

        Ok(())
    }

    #[test]
    fn cancelled_session() {
        let cancel = CancellationToken::new();
        let mut session = Session::<3>::new(Arc::new(SharedRing::new()), cancel.clone());

        cancel.cancel();
        assert_eq!(session.submit(b"never\n"), Err(RingError::Cancelled));

        let error = session.read(&mut [0; 8]).expect_err("Read should be cancelled");
        assert_eq!(error.kind(), io::ErrorKind::Other);
    }
}
