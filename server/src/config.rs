//! Server configuration: bind address, password and rate limits

use clap::Parser;
use shared::{PacketKind, DEFAULT_PORT};
use std::time::Duration;

/// Command line arguments of the server binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Password clients must supply; empty disables the check
    #[arg(long, default_value = "")]
    pub password: String,

    /// Minimum time between two chat messages from one client
    #[arg(long, default_value = "1000")]
    pub chat_interval_ms: u64,

    /// Minimum time between two ready changes from one client
    #[arg(long, default_value = "500")]
    pub ready_interval_ms: u64,

    /// Minimum time between two game actions of the same kind (0 disables)
    #[arg(long, default_value = "0")]
    pub action_interval_ms: u64,
}

/// Per-packet-kind minimum intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    pub chat: Duration,
    pub ready: Duration,
    pub action: Duration,
}

impl RateLimits {
    /// Interval enforced for `kind`, or `None` when the kind is not limited
    pub fn interval_for(&self, kind: PacketKind) -> Option<Duration> {
        let interval = match kind {
            PacketKind::ChatMessage => self.chat,
            PacketKind::PlayerReadyChanged => self.ready,
            PacketKind::PlayCard
            | PacketKind::ChooseColor
            | PacketKind::DrawCards
            | PacketKind::CallUno
            | PacketKind::ChallengeUno
            | PacketKind::ChallengeDrawFour => self.action,
            _ => return None,
        };

        if interval.is_zero() {
            None
        } else {
            Some(interval)
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            chat: Duration::from_millis(1000),
            ready: Duration::from_millis(500),
            action: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub password: String,
    pub rate_limits: RateLimits,
}

impl ServerConfig {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            password: String::new(),
            rate_limits: RateLimits::default(),
        }
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind_addr: format!("{}:{}", args.host, args.port),
            password: args.password,
            rate_limits: RateLimits {
                chat: Duration::from_millis(args.chat_interval_ms),
                ready: Duration::from_millis(args.ready_interval_ms),
                action: Duration::from_millis(args.action_interval_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RateLimits::default();
        assert_eq!(
            limits.interval_for(PacketKind::ChatMessage),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(
            limits.interval_for(PacketKind::PlayerReadyChanged),
            Some(Duration::from_millis(500))
        );
        assert_eq!(limits.interval_for(PacketKind::PlayCard), None);
        assert_eq!(limits.interval_for(PacketKind::Connect), None);
    }

    #[test]
    fn test_args_conversion() {
        let args = Args::parse_from([
            "server",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--password",
            "ABC123",
            "--action-interval-ms",
            "50",
        ]);
        let config = ServerConfig::from(args);

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.password, "ABC123");
        assert_eq!(
            config.rate_limits.interval_for(PacketKind::DrawCards),
            Some(Duration::from_millis(50))
        );
    }

    #[test]
    fn test_bind_address_parses() {
        let config = ServerConfig::default();
        assert!(config.bind_addr.parse::<std::net::SocketAddr>().is_ok());
    }
}
