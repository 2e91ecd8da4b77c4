//! Types shared by the card game server and its clients: the card model and
//! playability rule, turn bookkeeping, the packet protocol and its framing.

pub mod cards;
pub mod codec;
pub mod packets;
pub mod turn;

pub use cards::{is_playable, standard_deck, Card, CardColor, STANDARD_DECK_SIZE, STARTING_HAND_SIZE};
pub use codec::{read_packet, write_packet, MAX_PACKET_SIZE};
pub use packets::{ConnectionRejectionReason, Packet, PacketKind};
pub use turn::{advance_index, Direction, GameState, TurnInfo};

/// Default TCP port the server listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Fewest players needed before a round can start
pub const MIN_PLAYERS: usize = 2;

/// Most players the lobby admits; every seat must be dealt a full hand from
/// one deck with cards left over for the flip
pub const MAX_PLAYERS: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lobby_can_be_dealt() {
        assert!(MIN_PLAYERS <= MAX_PLAYERS);
        assert!(MAX_PLAYERS * STARTING_HAND_SIZE < STANDARD_DECK_SIZE);
    }
}
