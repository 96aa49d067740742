//! Buffer management for the pipe.
//!
//! Each endpoint owns one [`RingBuffer`] holding the bytes it wrote and
//! its peer has not read yet.

mod ring;

pub use ring::RingBuffer;
