mod engine;
mod pump;

use clap::Parser;
use log::info;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

use crate::pump::{PumpServer, PumpTarget};

const DEFAULT_TCP_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 7878));

/// Pumps socket traffic through an in-memory duplex pipe to an upper-case
/// echo engine.
#[derive(Debug, Parser)]
#[command(name = "pump", version)]
struct Options {
    /// TCP address to listen on (default 127.0.0.1:7878)
    #[arg(long, value_name = "ADDR", conflicts_with = "unix")]
    tcp: Option<SocketAddr>,

    /// Unix socket path to listen on
    #[arg(long, value_name = "PATH")]
    unix: Option<PathBuf>,

    /// Pipe buffer size per direction; 0 selects one maximal TLS record
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    capacity: usize,
}

impl Options {
    fn target(&self) -> PumpTarget {
        match (&self.unix, self.tcp) {
            (Some(path), _) => PumpTarget::Unix(path.clone()),
            (None, addr) => PumpTarget::Tcp(addr.unwrap_or(DEFAULT_TCP_ADDR)),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::parse();
    let target = options.target();
    info!("Starting pump on {:?}, pipe capacity {}", target, options.capacity);

    PumpServer::new(target, options.capacity).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::try_parse_from(["pump"]).unwrap();
        assert_eq!(options.target(), PumpTarget::Tcp("127.0.0.1:7878".parse().unwrap()));
        assert_eq!(options.capacity, 0);
    }

    #[test]
    fn test_tcp_address() {
        let options = Options::try_parse_from(["pump", "--tcp", "0.0.0.0:9000"]).unwrap();
        assert_eq!(options.target(), PumpTarget::Tcp("0.0.0.0:9000".parse().unwrap()));
    }

    #[test]
    fn test_unix_with_capacity() {
        let options =
            Options::try_parse_from(["pump", "--unix", "/tmp/pump.sock", "--capacity", "4096"]).unwrap();
        assert_eq!(options.target(), PumpTarget::Unix(PathBuf::from("/tmp/pump.sock")));
        assert_eq!(options.capacity, 4096);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(Options::try_parse_from(["pump", "--tcp"]).is_err());
        assert!(Options::try_parse_from(["pump", "--tcp", "not-an-addr"]).is_err());
        assert!(Options::try_parse_from(["pump", "--capacity", "lots"]).is_err());
        assert!(Options::try_parse_from(["pump", "--verbose"]).is_err());
    }

    #[test]
    fn test_tcp_and_unix_conflict() {
        let err = Options::try_parse_from(["pump", "--tcp", "127.0.0.1:1", "--unix", "/tmp/p.sock"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
