use duplexpipe::{create_pair, Endpoint, Transfer};
use futures::io::{AsyncRead, AsyncWrite};
use futures::{AsyncReadExt, AsyncWriteExt};
use log::*;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::{self, LocalSet};
use tokio_util::compat::TokioAsyncReadCompatExt;

use crate::engine::UpperEcho;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

/// Byte counts of one pumped connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub bytes_in: usize,
    pub bytes_out: usize,
}

#[derive(Debug, Clone)]
pub struct PumpServer {
    target: PumpTarget,
    capacity: usize,
}

impl PumpServer {
    pub fn new(target: PumpTarget, capacity: usize) -> Self {
        Self { target, capacity }
    }

    /// Accepts connections forever, pumping each one on its own local task.
    ///
    /// Endpoints are `!Send`, so connection tasks stay on the current thread
    /// inside a [`LocalSet`].
    pub async fn run(&self) -> io::Result<()> {
        LocalSet::new().run_until(self.accept_loop()).await
    }

    async fn accept_loop(&self) -> io::Result<()> {
        match &self.target {
            PumpTarget::Unix(path) => {
                if path.exists() {
                    let _ = std::fs::remove_file(path);
                }
                let listener = UnixListener::bind(path)?;
                info!("Pump listening on Unix Socket {:?}", path);
                loop {
                    let (stream, _) = listener.accept().await?;
                    info!("Accepted Unix connection");
                    self.spawn_connection(stream.compat());
                }
            }
            PumpTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                info!("Pump listening on TCP {:?}", addr);
                loop {
                    let (stream, peer) = listener.accept().await?;
                    info!("Accepted TCP connection from {:?}", peer);
                    self.spawn_connection(stream.compat());
                }
            }
        }
    }

    fn spawn_connection<T>(&self, stream: T)
    where
        T: AsyncRead + AsyncWrite + Unpin + 'static,
    {
        let server = self.clone();
        task::spawn_local(async move { server.serve(stream).await });
    }

    async fn serve<T>(&self, stream: T)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        match self.handle_connection(stream).await {
            Ok(stats) => info!(
                "Connection finished: {} bytes in, {} bytes out",
                stats.bytes_in, stats.bytes_out
            ),
            Err(e) => error!("Connection error: {}", e),
        }
    }

    /// Pairs a fresh pipe with the stream and runs the engine on the other
    /// end until both directions are finished.
    pub async fn handle_connection<T>(&self, stream: T) -> io::Result<PumpStats>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (engine_side, io_side) = create_pair(self.capacity, self.capacity)?;
        debug!(
            "Created pipe {} <-> {}, capacity {}",
            engine_side.id(),
            io_side.id(),
            io_side.write_buf_size()
        );

        let mut engine = UpperEcho::new();
        pump(stream, &io_side, &engine_side, &mut engine).await
    }
}

/// Shuttles bytes between `stream` and `io_side` while stepping `engine`
/// on `engine_side`.
///
/// Reads from the stream are sized by the pipe's write guarantee and, when
/// the engine is waiting, by its read request, so nothing read from the
/// socket ever has to be buffered outside the pipe.
pub async fn pump<T>(
    mut stream: T,
    io_side: &Endpoint,
    engine_side: &Endpoint,
    engine: &mut UpperEcho,
) -> io::Result<PumpStats>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut stats = PumpStats::default();
    let mut buf = vec![0u8; io_side.write_buf_size().max(engine_side.write_buf_size())];
    let mut socket_open = true;

    loop {
        let mut moved = false;

        // Engine output first, so a blocking socket read never holds it back
        while io_side.pending() > 0 {
            match io_side.read(&mut buf)? {
                Transfer::Progress(n) => {
                    stream.write_all(&buf[..n]).await?;
                    stats.bytes_out += n;
                    moved = true;
                }
                _ => break,
            }
        }
        stream.flush().await?;

        if io_side.is_eof() {
            debug_assert!(engine.is_done());
            debug!("Engine closed its output, closing stream");
            stream.close().await?;
            return Ok(stats);
        }

        if engine.step(engine_side)? {
            continue;
        }

        if socket_open {
            let guarantee = io_side.write_guarantee();
            if guarantee > 0 {
                let request = io_side.read_request();
                let want = if request > 0 { request.min(guarantee) } else { guarantee };
                let want = want.min(buf.len());

                let n = stream.read(&mut buf[..want]).await?;
                if n == 0 {
                    debug!("Stream reached EOF, shutting down pipe input");
                    io_side.shutdown_write()?;
                    socket_open = false;
                } else if let Transfer::Progress(written) = io_side.write(&buf[..n])? {
                    trace!("Fed {} bytes (request={}, guarantee={})", written, request, guarantee);
                    stats.bytes_in += written;
                }
                moved = true;
            }
        }

        if !moved {
            return Err(io::Error::other("pipe stalled: no progress on either side"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PumpServer, PumpTarget};
    use std::path::Path;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;
    use tokio::time::{sleep, timeout};
    use tokio_util::compat::TokioAsyncReadCompatExt;

    fn server(capacity: usize) -> PumpServer {
        PumpServer::new(PumpTarget::Tcp("127.0.0.1:0".parse().unwrap()), capacity)
    }

    #[tokio::test]
    async fn test_pump_uppercases_until_eof() {
        let (mut client, remote) = tokio::io::duplex(64);
        let server = server(16);

        let client_side = async move {
            client.write_all(b"hello pipe").await.unwrap();
            client.shutdown().await.unwrap();
            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            out
        };

        let (stats, out) = tokio::join!(server.handle_connection(remote.compat()), client_side);
        let stats = stats.unwrap();
        assert_eq!(out, b"HELLO PIPE");
        assert_eq!(stats.bytes_in, 10);
        assert_eq!(stats.bytes_out, 10);
    }

    #[tokio::test]
    async fn test_pump_payload_larger_than_pipe() {
        let (mut client, remote) = tokio::io::duplex(256);
        let server = server(8);
        let payload: Vec<u8> = (0..1000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let expected = payload.to_ascii_uppercase();

        let client_side = async move {
            let (mut rd, mut wr) = tokio::io::split(&mut client);
            let writer = async {
                wr.write_all(&payload).await.unwrap();
                wr.shutdown().await.unwrap();
            };
            let reader = async {
                let mut out = Vec::new();
                rd.read_to_end(&mut out).await.unwrap();
                out
            };
            tokio::join!(writer, reader).1
        };

        let (stats, out) = tokio::join!(server.handle_connection(remote.compat()), client_side);
        assert_eq!(out, expected);
        assert_eq!(stats.unwrap().bytes_out, 1000);
    }

    async fn connect(path: &Path) -> UnixStream {
        for _ in 0..100 {
            if let Ok(stream) = UnixStream::connect(path).await {
                return stream;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("pump never started listening on {:?}", path);
    }

    async fn exchange(stream: &mut UnixStream, data: &[u8]) -> Vec<u8> {
        stream.write_all(data).await.unwrap();
        stream.shutdown().await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_run_serves_clients_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pump.sock");
        let server = PumpServer::new(PumpTarget::Unix(path.clone()), 16);

        let clients = async {
            let mut idle = connect(&path).await;

            // The first client stays silent while the second is served
            let mut busy = connect(&path).await;
            let out = timeout(Duration::from_secs(2), exchange(&mut busy, b"hi"))
                .await
                .expect("second client was not served while the first idled");
            assert_eq!(out, b"HI");

            let out = timeout(Duration::from_secs(2), exchange(&mut idle, b"late"))
                .await
                .expect("first client was not served");
            assert_eq!(out, b"LATE");
        };

        tokio::select! {
            result = server.run() => panic!("accept loop ended: {:?}", result),
            () = clients => {}
        }
    }
}
