//! Registered players of the lobby
//!
//! This module tracks which connection belongs to which player name:
//! - One name per address, fixed once the handshake is accepted
//! - Names unique among active connections (exact, case-sensitive)
//! - Ready status per player
//! - Join order, which becomes seat order when a round starts
//!
//! The registry is not synchronised on its own. It lives inside the lobby,
//! whose lock makes every compound check-then-update atomic.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;

/// A player whose handshake was accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPlayer {
    /// Name chosen at connection time
    pub name: String,
    /// Connection the player speaks through
    pub addr: SocketAddr,
    /// Whether the player wants the next round to start
    pub ready: bool,
    /// Monotonic position in the join order
    pub join_order: u64,
}

#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<SocketAddr, RegisteredPlayer>,
    next_join_order: u64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.players.values().any(|player| player.name == name)
    }

    /// Registers `name` for `addr`
    ///
    /// Returns false if the address already has a name or the name is in use.
    pub fn register(&mut self, addr: SocketAddr, name: &str) -> bool {
        if self.players.contains_key(&addr) || self.is_name_taken(name) {
            return false;
        }

        let player = RegisteredPlayer {
            name: name.to_string(),
            addr,
            ready: false,
            join_order: self.next_join_order,
        };
        self.next_join_order += 1;

        info!("Player {} registered from {}", name, addr);
        self.players.insert(addr, player);
        true
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<RegisteredPlayer> {
        let removed = self.players.remove(addr);
        if let Some(player) = &removed {
            info!("Player {} unregistered", player.name);
        }
        removed
    }

    pub fn name_of(&self, addr: &SocketAddr) -> Option<&str> {
        self.players.get(addr).map(|player| player.name.as_str())
    }

    pub fn addr_of(&self, name: &str) -> Option<SocketAddr> {
        self.players
            .values()
            .find(|player| player.name == name)
            .map(|player| player.addr)
    }

    /// Returns false if no player is registered at `addr`
    pub fn set_ready(&mut self, addr: &SocketAddr, ready: bool) -> bool {
        match self.players.get_mut(addr) {
            Some(player) => {
                player.ready = ready;
                true
            }
            None => false,
        }
    }

    pub fn clear_ready(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    fn ordered(&self) -> Vec<&RegisteredPlayer> {
        let mut players: Vec<&RegisteredPlayer> = self.players.values().collect();
        players.sort_by_key(|player| player.join_order);
        players
    }

    /// Names in join order
    pub fn player_names(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .map(|player| player.name.clone())
            .collect()
    }

    /// Names of ready players, in join order
    pub fn ready_names(&self) -> Vec<String> {
        self.ordered()
            .into_iter()
            .filter(|player| player.ready)
            .map(|player| player.name.clone())
            .collect()
    }

    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|player| player.ready)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
