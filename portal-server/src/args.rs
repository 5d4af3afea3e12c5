//! Command-line argument parsing

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use portal_common::DEFAULT_PORT;
use portal_common::http::DEFAULT_HEAD_TIMEOUT;

use crate::relay::{DEFAULT_ENTRY_TTL, DEFAULT_SWEEP_INTERVAL, ReaperConfig};

/// File Portal relay server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds between stale-transfer sweeps
    #[arg(
        long = "sweep-interval",
        default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval: u64,

    /// Seconds an upload may wait for its downloader before eviction
    #[arg(
        long = "entry-ttl",
        default_value_t = DEFAULT_ENTRY_TTL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub entry_ttl: u64,

    /// Seconds a client may take to send its request head
    #[arg(
        long = "head-timeout",
        default_value_t = DEFAULT_HEAD_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub head_timeout: u64,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn reaper_config(&self) -> ReaperConfig {
        ReaperConfig {
            sweep_interval: Duration::from_secs(self.sweep_interval),
            entry_ttl: Duration::from_secs(self.entry_ttl),
        }
    }

    pub fn head_timeout(&self) -> Duration {
        Duration::from_secs(self.head_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["portald"]).unwrap();
        assert_eq!(args.listen_addr(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(args.reaper_config(), ReaperConfig::default());
        assert_eq!(args.head_timeout(), Duration::from_secs(30));
        assert!(!args.debug);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "portald",
            "-b",
            "::1",
            "-p",
            "9000",
            "--sweep-interval",
            "5",
            "--entry-ttl",
            "20",
            "--head-timeout",
            "3",
            "--debug",
        ])
        .unwrap();
        assert_eq!(args.listen_addr(), "[::1]:9000".parse().unwrap());
        assert_eq!(args.reaper_config().sweep_interval, Duration::from_secs(5));
        assert_eq!(args.reaper_config().entry_ttl, Duration::from_secs(20));
        assert_eq!(args.head_timeout(), Duration::from_secs(3));
        assert!(args.debug);
    }

    #[test]
    fn test_zero_durations_rejected() {
        assert!(Args::try_parse_from(["portald", "--sweep-interval", "0"]).is_err());
        assert!(Args::try_parse_from(["portald", "--entry-ttl", "0"]).is_err());
        assert!(Args::try_parse_from(["portald", "--head-timeout", "0"]).is_err());
    }

    #[test]
    fn test_invalid_bind_rejected() {
        assert!(Args::try_parse_from(["portald", "--bind", "not-an-ip"]).is_err());
    }
}
