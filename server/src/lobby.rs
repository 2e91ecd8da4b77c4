//! Lobby state: who is connected, who is ready, and the round in progress
//!
//! The lobby is the single owner of the player registry and the active game.
//! It sits behind one lock in the dispatcher, and every method here is one
//! compound operation performed under that lock.

use crate::error::PacketError;
use crate::game::ServerGameModel;
use crate::registry::PlayerRegistry;
use log::info;
use shared::{ConnectionRejectionReason, MAX_PLAYERS, MIN_PLAYERS};
use std::net::SocketAddr;

/// Lobby view handed to a newly accepted player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedConnection {
    pub existing_player_names: Vec<String>,
    pub ready_player_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player_name: String,
    /// The player was seated in the round, which has now been dropped
    pub game_abandoned: bool,
}

#[derive(Debug)]
pub struct Lobby {
    password: String,
    registry: PlayerRegistry,
    game: Option<ServerGameModel>,
}

impl Lobby {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            registry: PlayerRegistry::new(),
            game: None,
        }
    }

    /// Connection gatekeeper
    ///
    /// Checks the password (skipped when none is configured), then that a
    /// seat is free, then name uniqueness. On success returns the players registered before this one
    /// and which of them are ready, then registers the newcomer.
    pub fn accept_connection(
        &mut self,
        addr: SocketAddr,
        player_name: &str,
        password: &str,
    ) -> Result<AcceptedConnection, ConnectionRejectionReason> {
        if !self.password.is_empty() && self.password != password {
            return Err(ConnectionRejectionReason::IncorrectPassword);
        }
        if self.registry.len() >= MAX_PLAYERS {
            return Err(ConnectionRejectionReason::LobbyFull);
        }
        if self.registry.is_name_taken(player_name) {
            return Err(ConnectionRejectionReason::UsernameAlreadyTaken);
        }

        let accepted = AcceptedConnection {
            existing_player_names: self.registry.player_names(),
            ready_player_names: self.registry.ready_names(),
        };

        if !self.registry.register(addr, player_name) {
            // Only reachable if the address is already registered
            return Err(ConnectionRejectionReason::UsernameAlreadyTaken);
        }
        Ok(accepted)
    }

    /// Forgets `addr`; abandons the round if its player was seated
    pub fn disconnect(&mut self, addr: &SocketAddr) -> Option<Departure> {
        let player = self.registry.remove(addr)?;

        let seated = self
            .game
            .as_ref()
            .map_or(false, |game| game.player_index(&player.name).is_some());
        if seated {
            info!("{} left mid-round, abandoning the round", player.name);
            self.end_game();
        }

        Some(Departure {
            player_name: player.name,
            game_abandoned: seated,
        })
    }

    pub fn set_ready(&mut self, addr: &SocketAddr, ready: bool) -> Result<(), PacketError> {
        if self.game.is_some() {
            return Err(PacketError::bad(
                "ready status cannot change while a round is in progress",
                false,
            ));
        }
        if !self.registry.set_ready(addr, ready) {
            return Err(PacketError::bad(
                format!("no player is registered at {}", addr),
                false,
            ));
        }
        Ok(())
    }

    /// True once enough players are registered, all of them ready, and no
    /// round is running
    pub fn can_start(&self) -> bool {
        self.game.is_none() && self.registry.len() >= MIN_PLAYERS && self.registry.all_ready()
    }

    pub fn install_game(&mut self, game: ServerGameModel) {
        self.game = Some(game);
    }

    /// Drops the round and clears everyone's ready flag
    pub fn end_game(&mut self) {
        self.game = None;
        self.registry.clear_ready();
    }

    /// Resolves the sender of a game action to its seat and name
    ///
    /// A missing registration means the handshake never finished, or the
    /// connection was purged while the packet was in flight.
    pub fn seat_of(&self, addr: &SocketAddr) -> Result<(usize, String), PacketError> {
        let name = self
            .registry
            .name_of(addr)
            .ok_or_else(|| PacketError::bad(format!("{} has not completed the handshake", addr), true))?;
        let game = self
            .game
            .as_ref()
            .ok_or_else(|| PacketError::IllegalState("no round is in progress".to_string()))?;
        let seat = game.player_index(name).ok_or_else(|| {
            PacketError::IllegalState(format!("{} is not seated in this round", name))
        })?;
        Ok((seat, name.to_string()))
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn game(&self) -> Option<&ServerGameModel> {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> Option<&mut ServerGameModel> {
        self.game.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Card, CardColor};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn two_player_game() -> ServerGameModel {
        let red = Card::Numbered {
            color: CardColor::Red,
            number: 5,
        };
        ServerGameModel::from_parts(
            vec!["Alice".to_string(), "Bob".to_string()],
            vec![vec![red; 3]; 2],
            red,
            vec![red; 10],
        )
    }

    #[test]
    fn test_accept_without_password() {
        let mut lobby = Lobby::new("");
        let accepted = lobby.accept_connection(addr(1), "Alice", "anything").unwrap();
        assert!(accepted.existing_player_names.is_empty());

        let accepted = lobby.accept_connection(addr(2), "Bob", "").unwrap();
        assert_eq!(accepted.existing_player_names, vec!["Alice".to_string()]);
        assert_eq!(lobby.registry().len(), 2);
    }

    #[test]
    fn test_wrong_password_leaves_registry_empty() {
        let mut lobby = Lobby::new("ABC123");
        assert_eq!(
            lobby.accept_connection(addr(1), "Alice", "XYZ"),
            Err(ConnectionRejectionReason::IncorrectPassword)
        );
        assert!(lobby.registry().is_empty());
    }

    #[test]
    fn test_name_collision() {
        let mut lobby = Lobby::new("ABC123");
        lobby.accept_connection(addr(1), "Alice", "ABC123").unwrap();
        assert_eq!(
            lobby.accept_connection(addr(2), "Alice", "ABC123"),
            Err(ConnectionRejectionReason::UsernameAlreadyTaken)
        );
        assert_eq!(lobby.registry().len(), 1);
    }

    #[test]
    fn test_full_lobby_rejects_newcomers() {
        let mut lobby = Lobby::new("");
        for i in 0..MAX_PLAYERS {
            lobby
                .accept_connection(addr(100 + i as u16), &format!("P{}", i), "")
                .unwrap();
        }

        assert_eq!(
            lobby.accept_connection(addr(1), "Late", ""),
            Err(ConnectionRejectionReason::LobbyFull)
        );
        assert_eq!(lobby.registry().len(), MAX_PLAYERS);

        lobby.disconnect(&addr(100));
        assert!(lobby.accept_connection(addr(1), "Late", "").is_ok());
    }

    #[test]
    fn test_acceptance_lists_ready_subset() {
        let mut lobby = Lobby::new("");
        lobby.accept_connection(addr(1), "Alice", "").unwrap();
        lobby.accept_connection(addr(2), "Bob", "").unwrap();
        lobby.set_ready(&addr(2), true).unwrap();

        let accepted = lobby.accept_connection(addr(3), "Carol", "").unwrap();
        assert_eq!(
            accepted.existing_player_names,
            vec!["Alice".to_string(), "Bob".to_string()]
        );
        assert_eq!(accepted.ready_player_names, vec!["Bob".to_string()]);
    }

    #[test]
    fn test_can_start_requires_two_ready_players() {
        let mut lobby = Lobby::new("");
        lobby.accept_connection(addr(1), "Alice", "").unwrap();
        lobby.set_ready(&addr(1), true).unwrap();
        assert!(!lobby.can_start());

        lobby.accept_connection(addr(2), "Bob", "").unwrap();
        assert!(!lobby.can_start());

        lobby.set_ready(&addr(2), true).unwrap();
        assert!(lobby.can_start());
    }

    #[test]
    fn test_ready_change_refused_mid_round() {
        let mut lobby = Lobby::new("");
        lobby.accept_connection(addr(1), "Alice", "").unwrap();
        lobby.install_game(two_player_game());

        let err = lobby.set_ready(&addr(1), false).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_seat_resolution() {
        let mut lobby = Lobby::new("");
        lobby.accept_connection(addr(1), "Alice", "").unwrap();
        lobby.accept_connection(addr(2), "Bob", "").unwrap();
        lobby.accept_connection(addr(3), "Carol", "").unwrap();

        assert!(matches!(
            lobby.seat_of(&addr(1)),
            Err(PacketError::IllegalState(_))
        ));

        lobby.install_game(two_player_game());
        assert_eq!(lobby.seat_of(&addr(2)).unwrap(), (1, "Bob".to_string()));
        assert!(matches!(
            lobby.seat_of(&addr(3)),
            Err(PacketError::IllegalState(_))
        ));
        assert!(lobby.seat_of(&addr(9)).unwrap_err().is_fatal());
    }

    #[test]
    fn test_disconnect_of_seated_player_abandons_round() {
        let mut lobby = Lobby::new("");
        lobby.accept_connection(addr(1), "Alice", "").unwrap();
        lobby.accept_connection(addr(2), "Bob", "").unwrap();
        lobby.accept_connection(addr(3), "Carol", "").unwrap();
        lobby.install_game(two_player_game());

        let departure = lobby.disconnect(&addr(3)).unwrap();
        assert!(!departure.game_abandoned);
        assert!(lobby.game().is_some());

        let departure = lobby.disconnect(&addr(1)).unwrap();
        assert_eq!(departure.player_name, "Alice");
        assert!(departure.game_abandoned);
        assert!(lobby.game().is_none());

        assert!(lobby.disconnect(&addr(1)).is_none());
    }
}
