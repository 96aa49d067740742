use duplexpipe::{Endpoint, Transfer};

/// Toy protocol engine: echoes everything it reads in upper case.
///
/// Stands in for a real engine (e.g. TLS) sitting on the in-memory side
/// of the pipe. It only reads as much as it can write back, so its backlog
/// stays bounded by one partial write.
#[derive(Debug, Default)]
pub struct UpperEcho {
    backlog: Vec<u8>,
    input_done: bool,
}

impl UpperEcho {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the engine once against `endpoint`.
    ///
    /// Returns true if anything changed: bytes moved, end of input seen, or
    /// the write side shut down.
    pub fn step(&mut self, endpoint: &Endpoint) -> duplexpipe::Result<bool> {
        let mut progressed = self.flush_backlog(endpoint)?;

        if self.backlog.is_empty() && !self.input_done {
            let room = endpoint.write_guarantee();
            if room > 0 {
                let mut buf = vec![0u8; room];
                match endpoint.read(&mut buf)? {
                    Transfer::Progress(n) => {
                        buf.truncate(n);
                        buf.make_ascii_uppercase();
                        self.backlog = buf;
                        self.flush_backlog(endpoint)?;
                        progressed = true;
                    }
                    Transfer::EndOfStream => {
                        log::debug!("Engine input finished");
                        self.input_done = true;
                        progressed = true;
                    }
                    Transfer::WouldBlock => {}
                }
            }
        }

        if self.input_done && self.backlog.is_empty() && !endpoint.is_closed_for_write() {
            endpoint.shutdown_write()?;
            progressed = true;
        }

        Ok(progressed)
    }

    fn flush_backlog(&mut self, endpoint: &Endpoint) -> duplexpipe::Result<bool> {
        let mut progressed = false;
        while !self.backlog.is_empty() {
            match endpoint.write(&self.backlog)? {
                Transfer::Progress(n) => {
                    self.backlog.drain(..n);
                    progressed = true;
                }
                _ => break,
            }
        }
        Ok(progressed)
    }

    /// Returns true once the engine has shut down its output.
    pub fn is_done(&self) -> bool {
        self.input_done && self.backlog.is_empty()
    }
}
