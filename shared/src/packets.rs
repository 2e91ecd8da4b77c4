//! Packets exchanged between clients and the server

use crate::cards::{Card, CardColor};
use crate::turn::TurnInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionRejectionReason {
    IncorrectPassword,
    UsernameAlreadyTaken,
    LobbyFull,
}

impl fmt::Display for ConnectionRejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRejectionReason::IncorrectPassword => f.write_str("INCORRECT_PASSWORD"),
            ConnectionRejectionReason::UsernameAlreadyTaken => {
                f.write_str("USERNAME_ALREADY_TAKEN")
            }
            ConnectionRejectionReason::LobbyFull => f.write_str("LOBBY_FULL"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client to server
    Connect {
        player_name: String,
        server_password: String,
    },
    /// Relayed to everyone. `sender_name` is always overwritten by the server.
    ChatMessage {
        sender_name: String,
        message: String,
    },
    /// Relayed to everyone else. `player_name` is always overwritten by the server.
    PlayerReadyChanged {
        player_name: String,
        ready: bool,
    },
    PlayCard {
        card_index: usize,
        chosen_color: Option<CardColor>,
    },
    ChooseColor {
        color: CardColor,
    },
    DrawCards,
    CallUno,
    ChallengeUno {
        target_name: String,
    },
    ChallengeDrawFour,

    // Server to client
    ConnectionAccepted {
        existing_player_names: Vec<String>,
        ready_player_names: Vec<String>,
    },
    ConnectionRejected {
        reason: ConnectionRejectionReason,
    },
    PlayerConnected {
        player_name: String,
    },
    PlayerDisconnected {
        player_name: String,
    },
    GameStarted {
        player_names: Vec<String>,
        hand: Vec<Card>,
        card_counts: Vec<usize>,
        top_card: Card,
        turn: TurnInfo,
    },
    CardPlayed {
        player_name: String,
        card: Card,
        turn: TurnInfo,
    },
    ColorChosen {
        player_name: String,
        color: CardColor,
        turn: TurnInfo,
    },
    /// `cards` is only filled in for the player who drew them
    CardsDrawn {
        player_name: String,
        amount: usize,
        cards: Vec<Card>,
        turn: TurnInfo,
    },
    UnoCalled {
        player_name: String,
    },
    DrawFourChallenged {
        challenger_name: String,
        offender_name: String,
        succeeded: bool,
    },
    GameEnded {
        winner_name: Option<String>,
    },
    /// Non-fatal rejection of one of the recipient's packets
    Notice {
        message: String,
    },
}

/// Fieldless tag for each packet variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Connect,
    ChatMessage,
    PlayerReadyChanged,
    PlayCard,
    ChooseColor,
    DrawCards,
    CallUno,
    ChallengeUno,
    ChallengeDrawFour,
    ConnectionAccepted,
    ConnectionRejected,
    PlayerConnected,
    PlayerDisconnected,
    GameStarted,
    CardPlayed,
    ColorChosen,
    CardsDrawn,
    UnoCalled,
    DrawFourChallenged,
    GameEnded,
    Notice,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Connect { .. } => PacketKind::Connect,
            Packet::ChatMessage { .. } => PacketKind::ChatMessage,
            Packet::PlayerReadyChanged { .. } => PacketKind::PlayerReadyChanged,
            Packet::PlayCard { .. } => PacketKind::PlayCard,
            Packet::ChooseColor { .. } => PacketKind::ChooseColor,
            Packet::DrawCards => PacketKind::DrawCards,
            Packet::CallUno => PacketKind::CallUno,
            Packet::ChallengeUno { .. } => PacketKind::ChallengeUno,
            Packet::ChallengeDrawFour => PacketKind::ChallengeDrawFour,
            Packet::ConnectionAccepted { .. } => PacketKind::ConnectionAccepted,
            Packet::ConnectionRejected { .. } => PacketKind::ConnectionRejected,
            Packet::PlayerConnected { .. } => PacketKind::PlayerConnected,
            Packet::PlayerDisconnected { .. } => PacketKind::PlayerDisconnected,
            Packet::GameStarted { .. } => PacketKind::GameStarted,
            Packet::CardPlayed { .. } => PacketKind::CardPlayed,
            Packet::ColorChosen { .. } => PacketKind::ColorChosen,
            Packet::CardsDrawn { .. } => PacketKind::CardsDrawn,
            Packet::UnoCalled { .. } => PacketKind::UnoCalled,
            Packet::DrawFourChallenged { .. } => PacketKind::DrawFourChallenged,
            Packet::GameEnded { .. } => PacketKind::GameEnded,
            Packet::Notice { .. } => PacketKind::Notice,
        }
    }

    /// Identity field the server resolves from the origin address, if any
    pub fn identity_mut(&mut self) -> Option<&mut String> {
        match self {
            Packet::ChatMessage { sender_name, .. } => Some(sender_name),
            Packet::PlayerReadyChanged { player_name, .. } => Some(player_name),
            _ => None,
        }
    }
}
