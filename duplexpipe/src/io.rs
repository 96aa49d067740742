//! `std::io` adapters for [`Endpoint`].
//!
//! `WouldBlock` maps to [`std::io::ErrorKind::WouldBlock`] and
//! `EndOfStream` to `Ok(0)`, so endpoints plug into code written against
//! non-blocking sockets.

use crate::arena::Transfer;
use crate::endpoint::Endpoint;
use crate::error::Result;

fn into_io(result: Result<Transfer>) -> std::io::Result<usize> {
    match result? {
        Transfer::Progress(n) => Ok(n),
        Transfer::EndOfStream => Ok(0),
        Transfer::WouldBlock => Err(std::io::ErrorKind::WouldBlock.into()),
    }
}

impl std::io::Read for &Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        into_io(Endpoint::read(*self, buf))
    }
}

impl std::io::Write for &Endpoint {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        into_io(Endpoint::write(*self, buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Endpoint::flush(*self).map_err(Into::into)
    }
}

impl std::io::Read for Endpoint {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut &*self, buf)
    }
}

impl std::io::Write for Endpoint {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut &*self)
    }
}
