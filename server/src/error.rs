//! Error types for inbound packet handling and the rule engine

use shared::{GameState, PacketKind};
use std::time::Duration;
use thiserror::Error;

/// Why an inbound packet was refused
///
/// A refused packet never leaves a partial mutation behind. Only fatal bad
/// packets cost the sender its connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("{kind} received {elapsed_ms}ms after the previous one (limit {limit_ms}ms)")]
    Throttled {
        kind: PacketKind,
        elapsed_ms: u128,
        limit_ms: u128,
    },

    #[error("bad packet: {message}")]
    BadPacket { message: String, fatal: bool },

    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl PacketError {
    pub fn bad(message: impl Into<String>, fatal: bool) -> Self {
        PacketError::BadPacket {
            message: message.into(),
            fatal,
        }
    }

    pub fn throttled(kind: PacketKind, elapsed: Duration, limit: Duration) -> Self {
        PacketError::Throttled {
            kind,
            elapsed_ms: elapsed.as_millis(),
            limit_ms: limit.as_millis(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PacketError::BadPacket { fatal: true, .. })
    }
}

/// Rule-engine failures. None of them mutate the game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("it is not {0}'s turn")]
    NotYourTurn(String),

    #[error("cannot {action} while the game is {state}")]
    WrongState {
        action: &'static str,
        state: GameState,
    },

    #[error("{0} cannot be played on the discard pile")]
    CardNotPlayable(String),

    #[error("no card at index {0}")]
    NoSuchCard(usize),

    #[error("a color must be chosen for a wild draw four")]
    ColorRequired,

    #[error("{0} is not part of this game")]
    UnknownPlayer(String),

    #[error("{0}")]
    InvalidMove(String),

    #[error("draw and discard piles are both exhausted")]
    PilesExhausted,
}

impl From<GameError> for PacketError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::NoSuchCard(_) | GameError::ColorRequired | GameError::UnknownPlayer(_) => {
                PacketError::bad(err.to_string(), false)
            }
            GameError::NotYourTurn(_)
            | GameError::WrongState { .. }
            | GameError::CardNotPlayable(_)
            | GameError::InvalidMove(_)
            | GameError::PilesExhausted => PacketError::IllegalState(err.to_string()),
        }
    }
}
