//! Endpoint arena: pairing, transfer and introspection.
//!
//! Endpoints live in slots addressed by [`EndpointId`]. An id carries the
//! generation of the slot it was issued for, so ids that outlive a
//! [`PipeArena::teardown`] are rejected instead of aliasing a newer
//! endpoint. Linkage between two endpoints is only ever changed by
//! [`PipeArena::pair`] and [`PipeArena::unpair`], which update both sides in
//! the same call.
//!
//! # Example
//!
//! ```rust
//! use duplexpipe::{PipeArena, Transfer};
//!
//! let mut arena = PipeArena::new();
//! let (a, b) = arena.create_pair(10, 10).unwrap();
//!
//! assert_eq!(arena.write(a, b"hello").unwrap(), Transfer::Progress(5));
//!
//! let mut buf = [0u8; 5];
//! assert_eq!(arena.read(b, &mut buf).unwrap(), Transfer::Progress(5));
//! assert_eq!(&buf, b"hello");
//! ```

use alloc::vec::Vec;
use core::fmt;

use crate::buffer::RingBuffer;
use crate::error::{Error, ErrorKind, Result};
use crate::DEFAULT_BUFFER_SIZE;

/// Outcome of a read or write that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// `n` bytes were moved. `n` is 0 only for empty caller buffers.
    Progress(usize),

    /// Nothing could be moved right now; try again once the peer has
    /// drained (write) or produced (read) data.
    WouldBlock,

    /// The peer shut down its write side and every byte has been read.
    EndOfStream,
}

impl Transfer {
    /// Returns the byte count of a `Progress` result.
    pub fn bytes(self) -> Option<usize> {
        match self {
            Transfer::Progress(n) => Some(n),
            _ => None,
        }
    }

    /// Returns true for `WouldBlock`.
    pub fn is_would_block(self) -> bool {
        self == Transfer::WouldBlock
    }
}

/// Flow-control signal left on an endpoint by its last transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// A read found the peer's buffer empty.
    Read,

    /// A write found the own buffer full.
    Write,
}

/// Generation-checked handle to an endpoint slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId {
    index: u32,
    generation: u32,
}

impl EndpointId {
    /// Slot index inside the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot this id was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep{}.{}", self.index, self.generation)
    }
}

/// State of one side of a pipe.
#[derive(Debug)]
struct EndpointState {
    /// Other side of the pair; `Some` iff the endpoint is active.
    peer: Option<EndpointId>,

    /// Bytes written by this endpoint and not yet read by the peer.
    /// Allocated on first pairing.
    buffer: Option<RingBuffer>,

    /// Capacity used when the buffer gets allocated without an explicit
    /// size.
    size: usize,

    /// Set by `shutdown_write`, reset on pairing.
    closed: bool,

    /// Bytes the peer last tried to read in vain, clipped to capacity.
    request: usize,

    retry: Option<Retry>,
}

impl EndpointState {
    fn new() -> Self {
        Self {
            peer: None,
            buffer: None,
            size: DEFAULT_BUFFER_SIZE,
            closed: false,
            request: 0,
            retry: None,
        }
    }

    fn queued(&self) -> usize {
        self.buffer.as_ref().map_or(0, RingBuffer::len)
    }

    fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(self.size, RingBuffer::capacity)
    }

    /// Detaches from the peer and drops queued bytes. The buffer itself
    /// stays allocated for a later pairing.
    fn detach(&mut self) {
        self.peer = None;
        self.request = 0;
        self.retry = None;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    endpoint: Option<EndpointState>,
}

/// Arena owning every endpoint and ring buffer of a set of pipes.
///
/// All operations are non-blocking and single-threaded: they return
/// immediately with a definite result or [`Transfer::WouldBlock`].
#[derive(Debug, Default)]
pub struct PipeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

fn slot_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        log::warn!("Endpoint index space exhausted at {} slots", len);
        Error::new(ErrorKind::AllocationFailure)
    })
}

impl PipeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Returns the number of live endpoints.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true if the arena holds no live endpoint.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `id` refers to a live endpoint.
    pub fn contains(&self, id: EndpointId) -> bool {
        self.get(id).is_some()
    }

    fn get(&self, id: EndpointId) -> Option<&EndpointState> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.endpoint.as_ref()
    }

    fn get_mut(&mut self, id: EndpointId) -> Option<&mut EndpointState> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.endpoint.as_mut()
    }

    fn live(&self, id: EndpointId) -> Result<&EndpointState> {
        self.get(id).ok_or(Error::new(ErrorKind::StaleHandle))
    }

    fn live_mut(&mut self, id: EndpointId) -> Result<&mut EndpointState> {
        self.get_mut(id).ok_or(Error::new(ErrorKind::StaleHandle))
    }

    /// Borrows two distinct live endpoints at once.
    fn both_mut(
        &mut self,
        a: EndpointId,
        b: EndpointId,
    ) -> Option<(&mut EndpointState, &mut EndpointState)> {
        let (ia, ib) = (a.index as usize, b.index as usize);
        if ia == ib || ia >= self.slots.len() || ib >= self.slots.len() {
            return None;
        }

        let (lo, hi) = if ia < ib { (ia, ib) } else { (ib, ia) };
        let (left, right) = self.slots.split_at_mut(hi);
        let (low, high) = (&mut left[lo], &mut right[0]);
        let (slot_a, slot_b) = if ia < ib { (low, high) } else { (high, low) };

        if slot_a.generation != a.generation || slot_b.generation != b.generation {
            return None;
        }
        Some((slot_a.endpoint.as_mut()?, slot_b.endpoint.as_mut()?))
    }

    /// Creates an inert endpoint: no buffer and no peer.
    ///
    /// Fails with `AllocationFailure` once the `u32` index space is used up.
    pub fn new_endpoint(&mut self) -> Result<EndpointId> {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.endpoint = Some(EndpointState::new());
            return Ok(EndpointId {
                index,
                generation: slot.generation,
            });
        }

        let index = slot_index(self.slots.len())?;
        self.slots.push(Slot {
            generation: 0,
            endpoint: Some(EndpointState::new()),
        });
        Ok(EndpointId {
            index,
            generation: 0,
        })
    }

    /// Links two inert endpoints.
    ///
    /// Endpoints without a buffer get one of `capacity_a` / `capacity_b`
    /// bytes, or of their configured size when the capacity is 0. An
    /// endpoint that already owns a buffer from an earlier pairing keeps it
    /// and ignores the requested capacity.
    ///
    /// If a buffer cannot be allocated nothing is linked and no buffer
    /// allocated by this call survives.
    pub fn pair(
        &mut self,
        a: EndpointId,
        b: EndpointId,
        capacity_a: usize,
        capacity_b: usize,
    ) -> Result<()> {
        let state_a = self.live(a)?;
        let state_b = self.live(b)?;
        if a == b {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }
        if state_a.peer.is_some() || state_b.peer.is_some() {
            return Err(Error::new(ErrorKind::AlreadyInUse));
        }

        let fresh_a = Self::allocate(state_a, capacity_a)?;
        // On failure `fresh_a` is dropped here, which is the rollback
        let fresh_b = Self::allocate(state_b, capacity_b)?;

        let (state_a, state_b) = self
            .both_mut(a, b)
            .ok_or(Error::new(ErrorKind::StaleHandle))?;

        for (state, fresh, peer) in [(state_a, fresh_a, b), (state_b, fresh_b, a)] {
            if let Some(buffer) = fresh {
                state.size = buffer.capacity();
                state.buffer = Some(buffer);
            }
            if let Some(buffer) = state.buffer.as_mut() {
                buffer.clear();
            }
            state.peer = Some(peer);
            state.closed = false;
            state.request = 0;
            state.retry = None;
        }

        log::debug!("Paired {} <-> {}", a, b);
        Ok(())
    }

    fn allocate(state: &EndpointState, capacity: usize) -> Result<Option<RingBuffer>> {
        if state.buffer.is_some() {
            return Ok(None);
        }

        let size = if capacity != 0 { capacity } else { state.size };
        match RingBuffer::try_with_capacity(size) {
            Ok(buffer) => Ok(Some(buffer)),
            Err(e) => {
                log::warn!("Failed to allocate {} byte pipe buffer: {}", size, e);
                Err(e)
            }
        }
    }

    /// Creates two endpoints and pairs them.
    ///
    /// A capacity of 0 selects [`DEFAULT_BUFFER_SIZE`]. On failure both
    /// endpoints are destroyed again.
    pub fn create_pair(
        &mut self,
        capacity_a: usize,
        capacity_b: usize,
    ) -> Result<(EndpointId, EndpointId)> {
        let a = self.new_endpoint()?;
        let b = match self.new_endpoint() {
            Ok(b) => b,
            Err(e) => {
                self.release(a);
                return Err(e);
            }
        };

        if let Err(e) = self.pair(a, b, capacity_a, capacity_b) {
            self.release(a);
            self.release(b);
            return Err(e);
        }

        Ok((a, b))
    }

    /// Writes as much of `data` as fits into the endpoint's buffer.
    ///
    /// Returns `WouldBlock` if the buffer is completely full, and
    /// `Progress(0)` for empty `data`.
    pub fn write(&mut self, id: EndpointId, data: &[u8]) -> Result<Transfer> {
        let state = self.live_mut(id)?;
        state.retry = None;

        if state.peer.is_none() {
            return Err(Error::new(ErrorKind::NotReady));
        }
        if data.is_empty() {
            return Ok(Transfer::Progress(0));
        }

        state.request = 0;
        if state.closed {
            return Err(Error::new(ErrorKind::BrokenPipe));
        }

        let buffer = state
            .buffer
            .as_mut()
            .ok_or(Error::new(ErrorKind::NotReady))?;

        if buffer.is_full() {
            state.retry = Some(Retry::Write);
            log::trace!("{} write of {} bytes would block", id, data.len());
            return Ok(Transfer::WouldBlock);
        }

        let written = buffer.write(data);
        log::trace!("{} wrote {}/{} bytes, queued={}", id, written, data.len(), buffer.len());
        Ok(Transfer::Progress(written))
    }

    /// Reads bytes the peer has written into `buf`.
    ///
    /// Returns `EndOfStream` once the peer shut down its write side and
    /// nothing is queued. If the peer is still open and nothing is queued,
    /// records the request on the peer and returns `WouldBlock`.
    pub fn read(&mut self, id: EndpointId, buf: &mut [u8]) -> Result<Transfer> {
        let state = self.live_mut(id)?;
        state.retry = None;

        let peer_id = state.peer.ok_or(Error::new(ErrorKind::NotReady))?;
        let (state, peer) = self
            .both_mut(id, peer_id)
            .ok_or(Error::new(ErrorKind::NotReady))?;

        peer.request = 0;
        if buf.is_empty() {
            return Ok(Transfer::Progress(0));
        }

        let peer_buffer = peer
            .buffer
            .as_mut()
            .ok_or(Error::new(ErrorKind::NotReady))?;

        if peer_buffer.is_empty() {
            if peer.closed {
                log::trace!("{} reached end of stream", id);
                return Ok(Transfer::EndOfStream);
            }

            // Never ask for more than the peer can deliver in one write
            peer.request = core::cmp::min(buf.len(), peer_buffer.capacity());
            state.retry = Some(Retry::Read);
            log::trace!("{} read would block, request={}", id, peer.request);
            return Ok(Transfer::WouldBlock);
        }

        let read = peer_buffer.read(buf);
        log::trace!("{} read {}/{} bytes, left={}", id, read, buf.len(), peer_buffer.len());
        Ok(Transfer::Progress(read))
    }

    /// Closes the endpoint's write side, like `shutdown(SHUT_WR)`.
    ///
    /// Queued bytes stay readable by the peer. Idempotent.
    pub fn shutdown_write(&mut self, id: EndpointId) -> Result<()> {
        let state = self.live_mut(id)?;
        if !state.closed {
            log::debug!("{} shut down for write, queued={}", id, state.queued());
        }
        state.closed = true;
        Ok(())
    }

    /// Bytes are visible to the peer as soon as they are written.
    pub fn flush(&self, id: EndpointId) -> Result<()> {
        self.live(id).map(|_| ())
    }

    /// Breaks the pair `id` belongs to.
    ///
    /// Both sides lose their linkage and queued bytes and become inert.
    /// Their buffers stay allocated, so either side can be paired again.
    pub fn unpair(&mut self, id: EndpointId) -> Result<()> {
        let Some(peer_id) = self.live(id)?.peer else {
            return Ok(());
        };

        let (state, peer) = self
            .both_mut(id, peer_id)
            .ok_or(Error::new(ErrorKind::StaleHandle))?;
        debug_assert_eq!(peer.peer, Some(id));

        state.detach();
        peer.detach();

        log::debug!("Unpaired {} <-> {}", id, peer_id);
        Ok(())
    }

    /// Destroys an endpoint, unpairing it first.
    ///
    /// The surviving peer becomes inert. `id` is stale afterwards.
    pub fn teardown(&mut self, id: EndpointId) -> Result<()> {
        self.unpair(id)?;
        self.release(id);
        log::debug!("Tore down {}", id);
        Ok(())
    }

    fn release(&mut self, id: EndpointId) {
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.endpoint.take().is_some() {
                // A slot whose generation would wrap is retired for good
                match slot.generation.checked_add(1) {
                    Some(generation) => {
                        slot.generation = generation;
                        self.free.push(id.index);
                    }
                    None => log::debug!("Retired slot {} after {}", id.index, id),
                }
            }
        }
    }

    /// Capacity of the endpoint's write buffer, or the size it will get
    /// when paired.
    pub fn write_buf_size(&self, id: EndpointId) -> usize {
        self.get(id).map_or(0, EndpointState::capacity)
    }

    /// Bytes that can be written right now without `WouldBlock`.
    pub fn write_guarantee(&self, id: EndpointId) -> usize {
        match self.get(id) {
            Some(state) if state.peer.is_some() && !state.closed => state
                .buffer
                .as_ref()
                .map_or(0, RingBuffer::remaining),
            _ => 0,
        }
    }

    /// Bytes the peer unsuccessfully tried to read from this endpoint.
    pub fn read_request(&self, id: EndpointId) -> usize {
        self.get(id).map_or(0, |state| state.request)
    }

    /// Clears the read request, e.g. after a probing read on the peer.
    pub fn reset_read_request(&mut self, id: EndpointId) {
        if let Some(state) = self.get_mut(id) {
            state.request = 0;
        }
    }

    /// Bytes readable on this endpoint right now.
    pub fn pending(&self, id: EndpointId) -> usize {
        self.peer_state(id).map_or(0, EndpointState::queued)
    }

    /// Bytes written by this endpoint and not read by the peer yet.
    pub fn write_pending(&self, id: EndpointId) -> usize {
        self.get(id).map_or(0, EndpointState::queued)
    }

    /// True if unpaired, or if the peer is closed and fully drained.
    pub fn is_eof(&self, id: EndpointId) -> bool {
        match self.peer_state(id) {
            Some(peer) => peer.closed && peer.queued() == 0,
            None => true,
        }
    }

    fn peer_state(&self, id: EndpointId) -> Option<&EndpointState> {
        self.get(id)?.peer.and_then(|peer| self.get(peer))
    }

    /// Returns the endpoint's peer, if paired.
    pub fn peer(&self, id: EndpointId) -> Option<EndpointId> {
        self.get(id)?.peer
    }

    /// Returns true if the endpoint is paired.
    pub fn is_paired(&self, id: EndpointId) -> bool {
        self.peer(id).is_some()
    }

    /// Returns true once `shutdown_write` was called since the last
    /// pairing.
    pub fn is_closed_for_write(&self, id: EndpointId) -> bool {
        self.get(id).is_some_and(|state| state.closed)
    }

    /// Flow-control signal left by the endpoint's last read or write.
    pub fn retry(&self, id: EndpointId) -> Option<Retry> {
        self.get(id)?.retry
    }

    /// Returns true if the last read on the endpoint would have blocked.
    pub fn should_read(&self, id: EndpointId) -> bool {
        self.retry(id) == Some(Retry::Read)
    }

    /// Returns true if the last write on the endpoint would have blocked.
    pub fn should_write(&self, id: EndpointId) -> bool {
        self.retry(id) == Some(Retry::Write)
    }
}
