//! # duplexpipe - In-Memory Duplex Byte Pipes
//!
//! `duplexpipe` is a `no_std` compatible pair of linked endpoints that
//! exchange bytes through private ring buffers, without any socket or file
//! descriptor underneath. A protocol engine (a TLS state machine, say)
//! talks to one endpoint while the caller moves bytes between the other
//! endpoint and the real network:
//!
//! - **Ring buffers**: each endpoint owns a fixed-capacity buffer of the
//!   bytes it wrote and its peer has not read yet
//! - **Non-blocking**: every call returns at once with progress, a retry
//!   signal, or end of stream
//! - **Flow-control hints**: the writer can see how much it may write
//!   (`write_guarantee`) and how much the reader is waiting for
//!   (`read_request`)
//! - **Half close**: `shutdown_write` lets the peer drain what is queued
//!   and then observe end of stream
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐                              ┌───────────────┐
//! │  Endpoint A   │ ── write ──► [ ring A ] ── read ──►  Endpoint B │
//! │ (engine side) │ ◄── read ── [ ring B ] ◄── write ──  (I/O side) │
//! └───────────────┘                              └───────────────┘
//!          ▲                                             ▲
//!          └─────────────── PipeArena ───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use duplexpipe::{create_pair, Transfer};
//!
//! let (a, b) = create_pair(10, 10).unwrap();
//! assert_eq!(a.write(b"hello").unwrap(), Transfer::Progress(5));
//!
//! let mut buf = [0u8; 16];
//! assert_eq!(b.read(&mut buf).unwrap(), Transfer::Progress(5));
//! assert_eq!(b.read(&mut buf).unwrap(), Transfer::WouldBlock);
//! assert_eq!(a.read_request(), 10);
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod arena;
pub mod buffer;
pub mod config;
pub mod endpoint;
pub mod error;
#[cfg(feature = "std")]
pub mod io;

// Re-export commonly used types
pub use arena::{EndpointId, PipeArena, Retry, Transfer};
pub use buffer::RingBuffer;
pub use config::PairConfig;
pub use endpoint::{create_pair, create_pair_with, Endpoint};
pub use error::{Error, ErrorKind, Result};

/// Default write buffer size of an endpoint, enough for one maximal TLS
/// record.
pub const DEFAULT_BUFFER_SIZE: usize = 17 * 1024;
