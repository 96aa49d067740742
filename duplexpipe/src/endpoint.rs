//! Owning endpoint handles.
//!
//! [`create_pair`] returns two [`Endpoint`]s sharing one [`PipeArena`].
//! Dropping an endpoint tears it down, which leaves its peer inert.

use alloc::rc::Rc;
use core::cell::RefCell;

use crate::arena::{EndpointId, PipeArena, Retry, Transfer};
use crate::config::PairConfig;
use crate::error::{Error, ErrorKind, Result};

/// One side of a duplex pipe.
///
/// Reads return what the peer wrote; writes queue bytes for the peer. The
/// handle is `!Send`: all endpoints of an arena belong to one thread.
#[derive(Debug)]
pub struct Endpoint {
    arena: Rc<RefCell<PipeArena>>,
    id: EndpointId,
}

/// Creates a connected pair with the given buffer capacities.
///
/// A capacity of 0 selects [`DEFAULT_BUFFER_SIZE`](crate::DEFAULT_BUFFER_SIZE).
pub fn create_pair(capacity_a: usize, capacity_b: usize) -> Result<(Endpoint, Endpoint)> {
    let arena = Rc::new(RefCell::new(PipeArena::new()));
    let (a, b) = arena.borrow_mut().create_pair(capacity_a, capacity_b)?;

    Ok((
        Endpoint {
            arena: Rc::clone(&arena),
            id: a,
        },
        Endpoint { arena, id: b },
    ))
}

/// Creates a connected pair from a [`PairConfig`].
pub fn create_pair_with(config: &PairConfig) -> Result<(Endpoint, Endpoint)> {
    create_pair(config.capacity_a, config.capacity_b)
}

impl Endpoint {
    /// Returns the arena id of this endpoint.
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Creates an inert endpoint in the same arena, ready for
    /// [`pair_with`](Self::pair_with).
    pub fn sibling(&self) -> Result<Endpoint> {
        let id = self.arena.borrow_mut().new_endpoint()?;
        Ok(Endpoint {
            arena: Rc::clone(&self.arena),
            id,
        })
    }

    /// Pairs two inert endpoints of the same arena.
    pub fn pair_with(&self, other: &Endpoint, capacity: usize, other_capacity: usize) -> Result<()> {
        if !Rc::ptr_eq(&self.arena, &other.arena) {
            return Err(Error::new(ErrorKind::InvalidArgument));
        }
        self.arena
            .borrow_mut()
            .pair(self.id, other.id, capacity, other_capacity)
    }

    /// Returns true if `other` is this endpoint's peer.
    pub fn is_peer_of(&self, other: &Endpoint) -> bool {
        Rc::ptr_eq(&self.arena, &other.arena) && self.arena.borrow().peer(self.id) == Some(other.id)
    }

    /// See [`PipeArena::write`].
    pub fn write(&self, data: &[u8]) -> Result<Transfer> {
        self.arena.borrow_mut().write(self.id, data)
    }

    /// See [`PipeArena::read`].
    pub fn read(&self, buf: &mut [u8]) -> Result<Transfer> {
        self.arena.borrow_mut().read(self.id, buf)
    }

    /// See [`PipeArena::shutdown_write`].
    pub fn shutdown_write(&self) -> Result<()> {
        self.arena.borrow_mut().shutdown_write(self.id)
    }

    /// See [`PipeArena::unpair`].
    pub fn unpair(&self) -> Result<()> {
        self.arena.borrow_mut().unpair(self.id)
    }

    /// Destroys the endpoint now, reporting errors that `Drop` would only
    /// log.
    pub fn teardown(self) -> Result<()> {
        self.arena.borrow_mut().teardown(self.id)
    }

    /// Always succeeds for live endpoints.
    pub fn flush(&self) -> Result<()> {
        self.arena.borrow().flush(self.id)
    }

    /// Capacity of this endpoint's write buffer.
    pub fn write_buf_size(&self) -> usize {
        self.arena.borrow().write_buf_size(self.id)
    }

    /// Bytes that can be written without `WouldBlock`.
    pub fn write_guarantee(&self) -> usize {
        self.arena.borrow().write_guarantee(self.id)
    }

    /// Bytes the peer last tried to read in vain.
    pub fn read_request(&self) -> usize {
        self.arena.borrow().read_request(self.id)
    }

    /// Clears [`read_request`](Self::read_request).
    pub fn reset_read_request(&self) {
        self.arena.borrow_mut().reset_read_request(self.id)
    }

    /// Bytes readable right now.
    pub fn pending(&self) -> usize {
        self.arena.borrow().pending(self.id)
    }

    /// Bytes written and not yet read by the peer.
    pub fn write_pending(&self) -> usize {
        self.arena.borrow().write_pending(self.id)
    }

    /// True if unpaired, or if the peer is closed and drained.
    pub fn is_eof(&self) -> bool {
        self.arena.borrow().is_eof(self.id)
    }

    /// Id of the linked peer, if any.
    pub fn peer(&self) -> Option<EndpointId> {
        self.arena.borrow().peer(self.id)
    }

    /// True while linked to a peer.
    pub fn is_paired(&self) -> bool {
        self.arena.borrow().is_paired(self.id)
    }

    /// True after [`shutdown_write`](Self::shutdown_write).
    pub fn is_closed_for_write(&self) -> bool {
        self.arena.borrow().is_closed_for_write(self.id)
    }

    /// Signal left by the last read or write.
    pub fn retry(&self) -> Option<Retry> {
        self.arena.borrow().retry(self.id)
    }

    /// True if the last read would have blocked.
    pub fn should_read(&self) -> bool {
        self.arena.borrow().should_read(self.id)
    }

    /// True if the last write would have blocked.
    pub fn should_write(&self) -> bool {
        self.arena.borrow().should_write(self.id)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        match self.arena.try_borrow_mut() {
            Ok(mut arena) => {
                // Explicit `teardown` already released the slot
                if !arena.contains(self.id) {
                    return;
                }
                if let Err(e) = arena.teardown(self.id) {
                    log::warn!("Failed to tear down {}: {}", self.id, e);
                }
            }
            Err(_) => log::warn!("Arena busy, leaking endpoint {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_handles() {
        let (a, b) = create_pair(10, 10).unwrap();
        assert!(a.is_peer_of(&b));
        assert!(b.is_peer_of(&a));
        assert_eq!(a.peer(), Some(b.id()));

        assert_eq!(a.write(b"hello").unwrap(), Transfer::Progress(5));
        assert_eq!(b.pending(), 5);

        let mut buf = [0u8; 8];
        assert_eq!(b.read(&mut buf).unwrap(), Transfer::Progress(5));
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn test_drop_leaves_peer_inert() {
        let (a, b) = create_pair(10, 10).unwrap();
        a.write(b"queued").unwrap();
        drop(a);

        assert!(!b.is_paired());
        assert!(b.is_eof());
        assert_eq!(b.write(b"x").unwrap_err().kind(), ErrorKind::NotReady);
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap_err().kind(), ErrorKind::NotReady);
    }

    #[test]
    fn test_explicit_teardown() {
        let (a, b) = create_pair(4, 4).unwrap();
        assert!(a.teardown().is_ok());
        assert!(!b.is_paired());
        assert_eq!(b.arena.borrow().len(), 1);
    }

    #[test]
    fn test_repair_survivor_with_sibling() {
        let (a, b) = create_pair(8, 8).unwrap();
        drop(a);

        let c = b.sibling().unwrap();
        c.pair_with(&b, 0, 0).unwrap();
        assert!(c.is_peer_of(&b));
        assert_eq!(b.write_buf_size(), 8);

        c.write(b"hi").unwrap();
        c.shutdown_write().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), Transfer::Progress(2));
        assert_eq!(b.read(&mut buf).unwrap(), Transfer::EndOfStream);
    }

    #[test]
    fn test_pair_with_foreign_arena_rejected() {
        let (a, _b) = create_pair(4, 4).unwrap();
        let (c, _d) = create_pair(4, 4).unwrap();
        a.unpair().unwrap();
        c.unpair().unwrap();

        assert_eq!(a.pair_with(&c, 0, 0).unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_create_pair_with_config() {
        let config = PairConfig::default().with_capacity_a(32).with_capacity_b(0);
        let (a, b) = create_pair_with(&config).unwrap();
        assert_eq!(a.write_buf_size(), 32);
        assert_eq!(b.write_buf_size(), crate::DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_create_pair_allocation_failure() {
        let err = create_pair(usize::MAX, 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AllocationFailure);
    }
}
