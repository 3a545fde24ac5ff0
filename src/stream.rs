/*!
Scanning a sequence of chunks as one logical stream.

A stream's mutable state lives in a [`StreamState`], a fixed size byte
buffer separate from the table. The table itself is never modified, so any
number of streams may share one table. Since the state is plain bytes with
no internal pointers, it may be copied, persisted and resumed elsewhere
with [`StreamState::from_bytes`].
*/

use alloc::{vec, vec::Vec};

use crate::{
    error::ScanError,
    literal::{Groups, RESERVED_ID},
    scan::{self, Action, Haystack, Match, ScanStatus},
    table::Table,
    util::wire::{self, DeserializeError},
};

/// The size of the fixed part of a stream state. The history follows it.
pub(crate) const STATE_HEADER_LEN: usize = 32;

const FINGERPRINT: usize = 0;
const OFFSET: usize = 8;
const LAST_ID: usize = 16;
const HISTORY_LEN: usize = 20;
const STATUS: usize = 24;
const CAPACITY: usize = 28;

const STATUS_READY: u32 = 1;
const STATUS_CLOSED: u32 = 2;

/// Whether a stream accepts more chunks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamStatus {
    /// The stream may be scanned.
    Ready,
    /// The stream was closed. It must be reset before it is scanned again.
    Closed,
}

/// The state of one stream scan.
///
/// A state is created by [`Table::open_stream`] and is tied to that table:
/// using it with any other table is an error. It records the cumulative
/// offset of the stream, the identifier of the last reported match and the
/// trailing bytes of the stream needed to find literals that straddle chunk
/// boundaries.
///
/// # Example
///
/// This shows how a stream can be suspended by saving its state and resumed
/// later from a copy.
///
/// ```
/// use litmatch::{Action, Groups, Literal, StreamState, Table};
///
/// let table = Table::new(&[Literal::new("hobbit", 0)])?;
/// let mut state = table.open_stream();
/// table.scan_stream(&mut state, "in a hole lived a hob", Groups::ALL, |_| {
///     Action::Continue
/// })?;
///
/// let saved = state.as_bytes().to_vec();
/// let mut resumed = StreamState::from_bytes(saved)?;
/// let mut ends = vec![];
/// table.scan_stream(&mut resumed, "bit", Groups::ALL, |m| {
///     ends.push((m.start(), m.end()));
///     Action::Continue
/// })?;
/// assert_eq!(vec![(18, 23)], ends);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct StreamState<B = Vec<u8>> {
    bytes: B,
}

impl<B: AsRef<[u8]>> StreamState<B> {
    /// Wrap the raw bytes of a stream state, as returned by
    /// [`StreamState::as_bytes`].
    ///
    /// Only the structure of the bytes is checked here. Whether they belong
    /// to a particular table is checked when they are used with it.
    pub fn from_bytes(bytes: B) -> Result<StreamState<B>, DeserializeError> {
        let slice = bytes.as_ref();
        wire::check_slice_len(slice, STATE_HEADER_LEN, "stream state")?;
        let capacity = wire::read_u32(&slice[CAPACITY..]) as usize;
        let hist_len = wire::read_u32(&slice[HISTORY_LEN..]) as usize;
        if wire::add(STATE_HEADER_LEN, capacity, "stream state")?
            != slice.len()
        {
            return Err(DeserializeError::generic(
                "stream state length does not match its capacity",
            ));
        }
        if hist_len > capacity {
            return Err(DeserializeError::generic(
                "stream history exceeds its capacity",
            ));
        }
        let status = wire::read_u32(&slice[STATUS..]);
        if status != STATUS_READY && status != STATUS_CLOSED {
            return Err(DeserializeError::generic("invalid stream status"));
        }
        // The history always ends at the stream offset.
        if wire::read_u64(&slice[OFFSET..]) < hist_len as u64 {
            return Err(DeserializeError::generic(
                "stream offset is smaller than its history",
            ));
        }
        Ok(StreamState { bytes })
    }

    /// Returns the raw bytes of this state.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// Consumes this state and returns its backing buffer.
    pub fn into_inner(self) -> B {
        self.bytes
    }

    /// Returns the number of bytes scanned so far, which is also the offset
    /// of the first byte of the next chunk.
    pub fn offset(&self) -> u64 {
        wire::read_u64(&self.as_bytes()[OFFSET..])
    }

    /// Returns whether this stream accepts more chunks.
    pub fn status(&self) -> StreamStatus {
        if wire::read_u32(&self.as_bytes()[STATUS..]) == STATUS_CLOSED {
            StreamStatus::Closed
        } else {
            StreamStatus::Ready
        }
    }

    /// Returns the trailing bytes of the stream kept as context for the next
    /// chunk.
    pub fn history(&self) -> &[u8] {
        let len = wire::read_u32(&self.as_bytes()[HISTORY_LEN..]) as usize;
        &self.as_bytes()[STATE_HEADER_LEN..STATE_HEADER_LEN + len]
    }

    fn fingerprint(&self) -> u64 {
        wire::read_u64(&self.as_bytes()[FINGERPRINT..])
    }

    fn last_id(&self) -> Option<u32> {
        match wire::read_u32(&self.as_bytes()[LAST_ID..]) {
            RESERVED_ID => None,
            id => Some(id),
        }
    }
}

impl<B: AsRef<[u8]>> core::fmt::Debug for StreamState<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use crate::util::DebugBytes;

        f.debug_struct("StreamState")
            .field("status", &self.status())
            .field("offset", &self.offset())
            .field("last_id", &self.last_id())
            .field("history", &DebugBytes(self.history()))
            .finish()
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> StreamState<B> {
    fn reset(&mut self, fingerprint: u64) {
        let bytes = self.bytes.as_mut();
        let capacity = bytes.len() - STATE_HEADER_LEN;
        wire::write_u64(fingerprint, &mut bytes[FINGERPRINT..]);
        wire::write_u64(0, &mut bytes[OFFSET..]);
        wire::write_u32(RESERVED_ID, &mut bytes[LAST_ID..]);
        wire::write_u32(0, &mut bytes[HISTORY_LEN..]);
        wire::write_u32(STATUS_READY, &mut bytes[STATUS..]);
        wire::write_u32(capacity as u32, &mut bytes[CAPACITY..]);
        for b in bytes[STATE_HEADER_LEN..].iter_mut() {
            *b = 0;
        }
    }

    /// Appends a scanned chunk to the history, keeping only as many trailing
    /// bytes as fit, and advances the offset.
    fn absorb(&mut self, chunk: &[u8], last_id: Option<u32>) {
        let offset = self.offset() + chunk.len() as u64;
        let hist_len = self.history().len();
        let bytes = self.bytes.as_mut();
        let capacity = bytes.len() - STATE_HEADER_LEN;
        let history = &mut bytes[STATE_HEADER_LEN..];
        let new_len = if chunk.len() >= capacity {
            history.copy_from_slice(&chunk[chunk.len() - capacity..]);
            capacity
        } else {
            let keep = core::cmp::min(hist_len, capacity - chunk.len());
            history.copy_within(hist_len - keep..hist_len, 0);
            history[keep..keep + chunk.len()].copy_from_slice(chunk);
            keep + chunk.len()
        };
        wire::write_u64(offset, &mut bytes[OFFSET..]);
        wire::write_u32(last_id.unwrap_or(RESERVED_ID), &mut bytes[LAST_ID..]);
        wire::write_u32(new_len as u32, &mut bytes[HISTORY_LEN..]);
    }

    fn close(&mut self) {
        wire::write_u32(STATUS_CLOSED, &mut self.bytes.as_mut()[STATUS..]);
    }
}

impl<T: AsRef<[u8]>> Table<T> {
    /// Creates a new stream state for this table.
    pub fn open_stream(&self) -> StreamState {
        let mut state =
            StreamState { bytes: vec![0; self.stream_state_len()] };
        state.reset(self.fingerprint());
        state
    }

    /// Resets a stream state to the beginning of a new stream, as if it was
    /// just opened. This also reopens a closed stream.
    ///
    /// This fails if the state belongs to a different table.
    pub fn reset_stream<B: AsRef<[u8]> + AsMut<[u8]>>(
        &self,
        state: &mut StreamState<B>,
    ) -> Result<(), ScanError> {
        self.check_state(state)?;
        state.reset(self.fingerprint());
        Ok(())
    }

    /// Scans the next chunk of a stream, calling `f` for every match that
    /// ends in the chunk. Match offsets are relative to the start of the
    /// stream.
    ///
    /// If `f` terminates the scan, the chunk still counts as scanned: the
    /// stream's offset advances past it and the stream may be scanned again.
    ///
    /// This fails without modifying the state if the chunk is empty, the
    /// state belongs to a different table or the stream was closed.
    ///
    /// # Example
    ///
    /// ```
    /// use litmatch::{Action, Groups, Literal, Table};
    ///
    /// let table = Table::new(&[Literal::new("ab", 0)])?;
    /// let mut state = table.open_stream();
    /// let mut starts = vec![];
    /// for chunk in ["a", "b", "ab", "a"].iter() {
    ///     table.scan_stream(&mut state, chunk, Groups::ALL, |m| {
    ///         starts.push(m.start());
    ///         Action::Continue
    ///     })?;
    /// }
    /// assert_eq!(vec![0, 2], starts);
    /// assert_eq!(5, state.offset());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn scan_stream<B, H, F>(
        &self,
        state: &mut StreamState<B>,
        chunk: &H,
        groups: Groups,
        f: F,
    ) -> Result<ScanStatus, ScanError>
    where
        B: AsRef<[u8]> + AsMut<[u8]>,
        H: ?Sized + AsRef<[u8]>,
        F: FnMut(&Match) -> Action,
    {
        let chunk = chunk.as_ref();
        if chunk.is_empty() {
            return Err(ScanError::empty_haystack());
        }
        self.check_state(state)?;
        if state.status() == StreamStatus::Closed {
            return Err(ScanError::stream_closed());
        }
        let history = state.history();
        let offset = state.offset();
        let base = offset.checked_sub(history.len() as u64).ok_or_else(
            || ScanError::offset_underflow(offset, history.len()),
        )?;
        if offset.checked_add(chunk.len() as u64).is_none() {
            return Err(ScanError::offset_overflow(offset, chunk.len()));
        }
        let hay = Haystack::new(history, chunk);
        let mut last_id = state.last_id();
        let status = scan::run(
            &self.view(),
            &hay,
            history.len(),
            base,
            groups,
            &mut last_id,
            f,
        );
        state.absorb(chunk, last_id);
        Ok(status)
    }

    /// Closes a stream. Scanning a closed stream fails until it is reset.
    ///
    /// Every match of a literal stream is reported as soon as its last byte
    /// is scanned, so closing never reports anything.
    pub fn close_stream<B: AsRef<[u8]> + AsMut<[u8]>>(
        &self,
        state: &mut StreamState<B>,
    ) -> Result<(), ScanError> {
        self.check_state(state)?;
        state.close();
        Ok(())
    }

    fn check_state<B: AsRef<[u8]>>(
        &self,
        state: &StreamState<B>,
    ) -> Result<(), ScanError> {
        let found = state.as_bytes().len();
        if found != self.stream_state_len() {
            return Err(ScanError::state_size(self.stream_state_len(), found));
        }
        if state.fingerprint() != self.fingerprint() {
            return Err(ScanError::state_mismatch());
        }
        Ok(())
    }
}
