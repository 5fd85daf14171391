//! Command line configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// gRPC-style rendering API for the Waveshare 2.13inch eInk screen.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Address to listen on for the rendering API.
    #[arg(short, long, default_value = "[::]:48765")]
    pub listen_addr: SocketAddr,

    /// Log severity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Seconds given to in-flight requests between panel sleep and power down.
    #[arg(long, default_value = "5")]
    pub grace_secs: u64,

    /// Write every displayed frame to this file as a PBM image.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl Args {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            // `log` has no level above error
            LogLevel::Fatal | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warning => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["eink-display"]).unwrap();
        assert_eq!(args.listen_addr, "[::]:48765".parse().unwrap());
        assert_eq!(args.log_level, LogLevel::Info);
        assert_eq!(args.grace(), Duration::from_secs(5));
        assert!(args.snapshot.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "eink-display",
            "-l",
            "127.0.0.1:9000",
            "--log-level",
            "warning",
            "--grace-secs",
            "1",
        ])
        .unwrap();
        assert_eq!(args.listen_addr.port(), 9000);
        assert_eq!(LevelFilter::from(args.log_level), LevelFilter::Warn);
        assert_eq!(args.grace(), Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        assert!(Args::try_parse_from(["eink-display", "--log-level", "trace"]).is_err());
    }
}
