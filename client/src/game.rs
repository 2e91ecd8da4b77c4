//! Client-side mirror of the lobby and the round in progress
//!
//! The mirror is built purely from server packets. It knows its own hand and
//! how many cards everyone else holds, never their cards.

use log::{debug, warn};
use shared::{is_playable, Card, GameState, Packet, TurnInfo};

/// Public view of a running round plus this client's hand
#[derive(Debug, Clone, PartialEq)]
pub struct RoundView {
    pub player_names: Vec<String>,
    pub hand: Vec<Card>,
    pub card_counts: Vec<usize>,
    pub top_card: Card,
    pub turn: TurnInfo,
    pub uno_called: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientGameModel {
    own_name: String,
    players: Vec<String>,
    ready: Vec<String>,
    round: Option<RoundView>,
    last_winner: Option<String>,
}

impl ClientGameModel {
    pub fn new(own_name: impl Into<String>) -> Self {
        Self {
            own_name: own_name.into(),
            ..Self::default()
        }
    }

    /// Records this client's own ready change, which the server does not
    /// echo back to the sender
    pub fn set_own_ready(&mut self, ready: bool) {
        let name = self.own_name.clone();
        self.set_ready(&name, ready);
    }

    fn set_ready(&mut self, name: &str, ready: bool) {
        self.ready.retain(|other| other != name);
        if ready {
            self.ready.push(name.to_string());
        }
    }

    fn seat_of(&self, name: &str) -> Option<usize> {
        self.round
            .as_ref()
            .and_then(|round| round.player_names.iter().position(|p| p == name))
    }

    /// Folds one server packet into the mirror
    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::ConnectionAccepted {
                existing_player_names,
                ready_player_names,
            } => {
                self.players = existing_player_names.clone();
                self.players.push(self.own_name.clone());
                self.ready = ready_player_names.clone();
            }

            Packet::PlayerConnected { player_name } => {
                if !self.players.contains(player_name) {
                    self.players.push(player_name.clone());
                }
            }

            Packet::PlayerDisconnected { player_name } => {
                self.players.retain(|p| p != player_name);
                self.ready.retain(|p| p != player_name);
            }

            Packet::PlayerReadyChanged { player_name, ready } => {
                self.set_ready(player_name, *ready);
            }

            Packet::GameStarted {
                player_names,
                hand,
                card_counts,
                top_card,
                turn,
            } => {
                self.round = Some(RoundView {
                    player_names: player_names.clone(),
                    hand: hand.clone(),
                    card_counts: card_counts.clone(),
                    top_card: *top_card,
                    turn: *turn,
                    uno_called: Vec::new(),
                });
                self.last_winner = None;
            }

            Packet::CardPlayed {
                player_name,
                card,
                turn,
            } => {
                let seat = self.seat_of(player_name);
                let own = *player_name == self.own_name;
                let Some(round) = self.round.as_mut() else {
                    warn!("CardPlayed outside of a round");
                    return;
                };

                round.top_card = *card;
                round.turn = *turn;
                if let Some(count) = seat.and_then(|seat| round.card_counts.get_mut(seat)) {
                    *count = count.saturating_sub(1);
                    if *count != 1 {
                        round.uno_called.retain(|p| p != player_name);
                    }
                }
                if own {
                    let played = card.reset();
                    match round.hand.iter().position(|held| *held == played) {
                        Some(index) => {
                            round.hand.remove(index);
                        }
                        None => warn!("Played card {} was not in the local hand", card),
                    }
                }
            }

            Packet::ColorChosen { color, turn, .. } => {
                if let Some(round) = self.round.as_mut() {
                    round.top_card.choose_color(*color);
                    round.turn = *turn;
                }
            }

            Packet::CardsDrawn {
                player_name,
                amount,
                cards,
                turn,
            } => {
                let seat = self.seat_of(player_name);
                let own = *player_name == self.own_name;
                let Some(round) = self.round.as_mut() else {
                    warn!("CardsDrawn outside of a round");
                    return;
                };

                round.turn = *turn;
                if let Some(count) = seat.and_then(|seat| round.card_counts.get_mut(seat)) {
                    *count += amount;
                }
                round.uno_called.retain(|p| p != player_name);
                if own {
                    round.hand.extend_from_slice(cards);
                }
            }

            Packet::UnoCalled { player_name } => {
                if let Some(round) = self.round.as_mut() {
                    round.uno_called.push(player_name.clone());
                }
            }

            Packet::GameEnded { winner_name } => {
                self.round = None;
                self.ready.clear();
                self.last_winner = winner_name.clone();
            }

            Packet::ChatMessage { .. }
            | Packet::DrawFourChallenged { .. }
            | Packet::ConnectionRejected { .. }
            | Packet::Notice { .. } => {}

            other => debug!("Ignoring {} from server", other.kind()),
        }
    }

    /* Queries */

    pub fn own_name(&self) -> &str {
        &self.own_name
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn ready_players(&self) -> &[String] {
        &self.ready
    }

    pub fn is_ready(&self, name: &str) -> bool {
        self.ready.iter().any(|p| p == name)
    }

    pub fn round(&self) -> Option<&RoundView> {
        self.round.as_ref()
    }

    pub fn in_round(&self) -> bool {
        self.round.is_some()
    }

    pub fn last_winner(&self) -> Option<&str> {
        self.last_winner.as_deref()
    }

    pub fn hand(&self) -> &[Card] {
        self.round
            .as_ref()
            .map(|round| round.hand.as_slice())
            .unwrap_or_default()
    }

    pub fn card_counts(&self) -> Vec<(String, usize)> {
        self.round.as_ref().map_or_else(Vec::new, |round| {
            round
                .player_names
                .iter()
                .cloned()
                .zip(round.card_counts.iter().copied())
                .collect()
        })
    }

    pub fn last_played_card(&self) -> Option<&Card> {
        self.round.as_ref().map(|round| &round.top_card)
    }

    pub fn state(&self) -> Option<GameState> {
        self.round.as_ref().map(|round| round.turn.state)
    }

    pub fn turn(&self) -> Option<TurnInfo> {
        self.round.as_ref().map(|round| round.turn)
    }

    pub fn current_player_name(&self) -> Option<&str> {
        self.round.as_ref().and_then(|round| {
            round
                .player_names
                .get(round.turn.current_index)
                .map(String::as_str)
        })
    }

    pub fn is_my_turn(&self) -> bool {
        self.current_player_name() == Some(self.own_name.as_str())
    }

    /// Whether `card` could go on the current top card
    ///
    /// Only the colour and symbol rule is checked; the server still decides
    /// whether a pending draw allows the play.
    pub fn is_card_playable(&self, card: &Card) -> bool {
        self.last_played_card()
            .map_or(false, |top| is_playable(card, top))
    }
}
