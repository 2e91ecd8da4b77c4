//! Inbound packet validation and dispatch
//!
//! Every packet a client sends passes through [`PacketDispatcher::handle`],
//! which runs these steps in a fixed order:
//!
//! 1. Throttle: refuse the packet if its kind is rate limited and the same
//!    address sent one too recently
//! 2. Attribute: overwrite any client-supplied identity with the name
//!    registered for the origin address
//! 3. Route: look the kind up in the routing table; unknown kinds are fatal
//! 4. Validate & mutate: the handler checks its preconditions against the
//!    lobby and game, then applies the change
//! 5. Relay: forward the packet to the other clients if its kind is
//!    distributed
//!
//! A packet refused at any step is neither applied nor relayed.

use crate::config::{RateLimits, ServerConfig};
use crate::error::{GameError, PacketError};
use crate::game::ServerGameModel;
use crate::lobby::Lobby;
use crate::rate_limit::RateLimitLedger;
use crate::transport::Transport;
use log::{debug, error, info, warn};
use shared::{Card, Packet, PacketKind, TurnInfo};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Who receives a relayed packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    ToAll,
    ToAllExceptSender,
}

type Handler = fn(&PacketDispatcher, SocketAddr, &Packet) -> Result<(), PacketError>;
type FollowUp = fn(&PacketDispatcher);

struct PacketRoute {
    kind: PacketKind,
    handler: Handler,
    distribution: Option<Distribution>,
    /// Runs after a successful relay
    follow_up: Option<FollowUp>,
}

static ROUTES: &[PacketRoute] = &[
    PacketRoute {
        kind: PacketKind::Connect,
        handler: PacketDispatcher::handle_connect,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::ChatMessage,
        handler: PacketDispatcher::handle_chat,
        distribution: Some(Distribution::ToAll),
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::PlayerReadyChanged,
        handler: PacketDispatcher::handle_ready_changed,
        distribution: Some(Distribution::ToAllExceptSender),
        follow_up: Some(PacketDispatcher::try_start_game),
    },
    PacketRoute {
        kind: PacketKind::PlayCard,
        handler: PacketDispatcher::handle_play_card,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::ChooseColor,
        handler: PacketDispatcher::handle_choose_color,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::DrawCards,
        handler: PacketDispatcher::handle_draw_cards,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::CallUno,
        handler: PacketDispatcher::handle_call_uno,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::ChallengeUno,
        handler: PacketDispatcher::handle_challenge_uno,
        distribution: None,
        follow_up: None,
    },
    PacketRoute {
        kind: PacketKind::ChallengeDrawFour,
        handler: PacketDispatcher::handle_challenge_draw_four,
        distribution: None,
        follow_up: None,
    },
];

fn route_for(kind: PacketKind) -> Option<&'static PacketRoute> {
    ROUTES.iter().find(|route| route.kind == kind)
}

/// Relay policy of `kind`, `None` if it is never relayed or not accepted
pub fn distribution_for(kind: PacketKind) -> Option<Distribution> {
    route_for(kind).and_then(|route| route.distribution)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unexpected(packet: &Packet) -> PacketError {
    PacketError::bad(format!("Unexpected packet type {}", packet.kind()), true)
}

fn no_round() -> PacketError {
    PacketError::IllegalState("no round is in progress".to_string())
}

pub struct PacketDispatcher {
    lobby: Mutex<Lobby>,
    ledger: Mutex<RateLimitLedger>,
    rate_limits: RateLimits,
    transport: Arc<dyn Transport>,
}

impl PacketDispatcher {
    pub fn new(config: &ServerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            lobby: Mutex::new(Lobby::new(config.password.clone())),
            ledger: Mutex::new(RateLimitLedger::new()),
            rate_limits: config.rate_limits.clone(),
            transport,
        }
    }

    fn lobby(&self) -> MutexGuard<'_, Lobby> {
        lock(&self.lobby)
    }

    /* Transport callbacks */

    pub fn on_new_connection(&self, addr: SocketAddr) {
        info!("New connection from {}", addr);
    }

    /// Handles a packet and reports any refusal back to its sender
    ///
    /// Fatal refusals and rejected handshakes also close the connection.
    /// Returns false once nothing more should be read from `origin`.
    pub fn on_packet_received(&self, origin: SocketAddr, packet: Packet) -> bool {
        let kind = packet.kind();
        match self.handle(origin, packet) {
            Ok(()) if kind == PacketKind::Connect => self.is_registered(&origin),
            Ok(()) => true,
            Err(err) if err.is_fatal() => {
                warn!("Closing {} after {} packet: {}", origin, kind, err);
                self.transport.write_to(
                    origin,
                    Packet::Notice {
                        message: err.to_string(),
                    },
                );
                self.transport.close_connection(origin);
                false
            }
            Err(err) => {
                warn!("Rejected {} packet from {}: {}", kind, origin, err);
                self.transport.write_to(
                    origin,
                    Packet::Notice {
                        message: err.to_string(),
                    },
                );
                true
            }
        }
    }

    /// Purges everything known about `addr`
    pub fn on_connection_closed(&self, addr: SocketAddr) {
        lock(&self.ledger).purge(&addr);

        let mut lobby = self.lobby();
        if let Some(departure) = lobby.disconnect(&addr) {
            info!("{} disconnected", departure.player_name);
            self.transport.write_to_all_except(
                Packet::PlayerDisconnected {
                    player_name: departure.player_name,
                },
                addr,
            );
            if departure.game_abandoned {
                self.transport
                    .write_to_all(Packet::GameEnded { winner_name: None });
            }
        } else {
            debug!("Connection {} closed before completing the handshake", addr);
        }
    }

    /* Pipeline */

    pub fn handle(&self, origin: SocketAddr, mut packet: Packet) -> Result<(), PacketError> {
        let kind = packet.kind();

        if let Some(interval) = self.rate_limits.interval_for(kind) {
            lock(&self.ledger).check_and_record(origin, kind, interval, Instant::now())?;
        }

        if let Some(identity) = packet.identity_mut() {
            let lobby = self.lobby();
            let name = lobby.registry().name_of(&origin).ok_or_else(|| {
                PacketError::bad(
                    format!("{} sent {} before completing the handshake", origin, kind),
                    true,
                )
            })?;
            *identity = name.to_string();
        }

        let route = route_for(kind).ok_or_else(|| unexpected(&packet))?;
        debug!("Routing {} from {}", kind, origin);
        (route.handler)(self, origin, &packet)?;

        match route.distribution {
            Some(Distribution::ToAll) => self.transport.write_to_all(packet),
            Some(Distribution::ToAllExceptSender) => {
                self.transport.write_to_all_except(packet, origin)
            }
            None => {}
        }

        if let Some(follow_up) = route.follow_up {
            follow_up(self);
        }
        Ok(())
    }

    /* Lobby handlers */

    fn handle_connect(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::Connect {
            player_name,
            server_password,
        } = packet
        else {
            return Err(unexpected(packet));
        };

        if player_name.trim().is_empty() {
            return Err(PacketError::bad("player name must not be empty", true));
        }

        let mut lobby = self.lobby();
        if lobby.registry().name_of(&origin).is_some() {
            return Err(PacketError::bad(
                format!("{} already completed the handshake", origin),
                true,
            ));
        }

        match lobby.accept_connection(origin, player_name, server_password) {
            Ok(accepted) => {
                info!("Accepted {} from {}", player_name, origin);
                self.transport.write_to(
                    origin,
                    Packet::ConnectionAccepted {
                        existing_player_names: accepted.existing_player_names,
                        ready_player_names: accepted.ready_player_names,
                    },
                );
                self.transport.write_to_all_except(
                    Packet::PlayerConnected {
                        player_name: player_name.clone(),
                    },
                    origin,
                );
            }
            Err(reason) => {
                info!("Rejected connection from {}: {}", origin, reason);
                self.transport
                    .write_to(origin, Packet::ConnectionRejected { reason });
                self.transport.close_connection(origin);
            }
        }
        Ok(())
    }

    fn handle_chat(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::ChatMessage {
            sender_name,
            message,
        } = packet
        else {
            return Err(unexpected(packet));
        };

        match self.lobby().registry().addr_of(sender_name) {
            Some(addr) if addr == origin => {
                info!("[chat] {}: {}", sender_name, message);
                Ok(())
            }
            _ => Err(PacketError::bad(
                format!("chat from {} was not expected from {}", sender_name, origin),
                false,
            )),
        }
    }

    fn handle_ready_changed(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::PlayerReadyChanged { player_name, ready } = packet else {
            return Err(unexpected(packet));
        };

        self.lobby().set_ready(&origin, *ready)?;
        info!(
            "{} is {}",
            player_name,
            if *ready { "ready" } else { "no longer ready" }
        );
        Ok(())
    }

    fn try_start_game(&self) {
        let mut lobby = self.lobby();
        if !lobby.can_start() {
            return;
        }

        match ServerGameModel::new(lobby.registry().player_names()) {
            Ok(game) => self.begin_round_locked(&mut lobby, game),
            Err(err) => {
                error!("Unable to start a round: {}", err);
                lobby.end_game();
                self.transport.write_to_all(Packet::Notice {
                    message: format!("the round could not be started: {}", err),
                });
            }
        }
    }

    /// Installs `game` as the active round and deals each seat its hand
    pub fn begin_round(&self, game: ServerGameModel) {
        let mut lobby = self.lobby();
        self.begin_round_locked(&mut lobby, game);
    }

    fn begin_round_locked(&self, lobby: &mut Lobby, game: ServerGameModel) {
        let player_names = game.players().to_vec();
        let card_counts = game.card_counts();
        let top_card = *game.last_played_card();
        let turn = game.turn_info();

        for (seat, name) in player_names.iter().enumerate() {
            let Some(addr) = lobby.registry().addr_of(name) else {
                continue;
            };
            let hand = game.hand(seat).map(<[Card]>::to_vec).unwrap_or_default();
            self.transport.write_to(
                addr,
                Packet::GameStarted {
                    player_names: player_names.clone(),
                    hand,
                    card_counts: card_counts.clone(),
                    top_card,
                    turn,
                },
            );
        }

        info!(
            "Round started: {} (first card {}, {} to act)",
            player_names.join(", "),
            top_card,
            game.current_player_name()
        );
        lobby.install_game(game);
    }

    /* Game handlers */

    fn handle_play_card(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::PlayCard {
            card_index,
            chosen_color,
        } = packet
        else {
            return Err(unexpected(packet));
        };

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        let outcome = game.play_card(seat, *card_index, *chosen_color)?;
        let turn = game.turn_info();

        self.transport.write_to_all(Packet::CardPlayed {
            player_name: name.clone(),
            card: outcome.card,
            turn,
        });

        if outcome.won {
            self.finish_round(&mut lobby, Some(name));
        }
        Ok(())
    }

    fn handle_choose_color(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::ChooseColor { color } = packet else {
            return Err(unexpected(packet));
        };

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        game.choose_color(seat, *color)?;
        self.transport.write_to_all(Packet::ColorChosen {
            player_name: name,
            color: *color,
            turn: game.turn_info(),
        });
        Ok(())
    }

    fn handle_draw_cards(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        if !matches!(packet, Packet::DrawCards) {
            return Err(unexpected(packet));
        }

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        let cards = game.draw_cards(seat)?;
        let turn = game.turn_info();
        self.announce_draw(&lobby, &name, cards, turn);
        Ok(())
    }

    fn handle_call_uno(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        if !matches!(packet, Packet::CallUno) {
            return Err(unexpected(packet));
        }

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        game.call_uno(seat)?;
        info!("{} called UNO", name);
        self.transport
            .write_to_all(Packet::UnoCalled { player_name: name });
        Ok(())
    }

    fn handle_challenge_uno(&self, origin: SocketAddr, packet: &Packet) -> Result<(), PacketError> {
        let Packet::ChallengeUno { target_name } = packet else {
            return Err(unexpected(packet));
        };

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        let target = game
            .player_index(target_name)
            .ok_or_else(|| GameError::UnknownPlayer(target_name.clone()))?;
        let cards = game.challenge_uno(seat, target)?;
        let turn = game.turn_info();

        info!("{} caught {} without calling UNO", name, target_name);
        self.announce_draw(&lobby, target_name, cards, turn);
        Ok(())
    }

    fn handle_challenge_draw_four(
        &self,
        origin: SocketAddr,
        packet: &Packet,
    ) -> Result<(), PacketError> {
        if !matches!(packet, Packet::ChallengeDrawFour) {
            return Err(unexpected(packet));
        }

        let mut lobby = self.lobby();
        let (seat, name) = lobby.seat_of(&origin)?;
        let game = lobby.game_mut().ok_or_else(no_round)?;

        let outcome = game.challenge_draw_four(seat)?;
        let offender_name = game.players()[outcome.offender_index].clone();
        let penalized_name = game.players()[outcome.penalized_index].clone();
        let turn = game.turn_info();

        self.transport.write_to_all(Packet::DrawFourChallenged {
            challenger_name: name,
            offender_name,
            succeeded: outcome.succeeded,
        });
        self.announce_draw(&lobby, &penalized_name, outcome.cards, turn);
        Ok(())
    }

    /// The drawer learns its cards; everyone else only learns how many
    fn announce_draw(&self, lobby: &Lobby, player_name: &str, cards: Vec<Card>, turn: TurnInfo) {
        let public = Packet::CardsDrawn {
            player_name: player_name.to_string(),
            amount: cards.len(),
            cards: Vec::new(),
            turn,
        };

        match lobby.registry().addr_of(player_name) {
            Some(addr) => {
                self.transport.write_to(
                    addr,
                    Packet::CardsDrawn {
                        player_name: player_name.to_string(),
                        amount: cards.len(),
                        cards,
                        turn,
                    },
                );
                self.transport.write_to_all_except(public, addr);
            }
            None => self.transport.write_to_all(public),
        }
    }

    fn finish_round(&self, lobby: &mut Lobby, winner_name: Option<String>) {
        match &winner_name {
            Some(winner) => info!("{} won the round", winner),
            None => info!("Round ended without a winner"),
        }
        lobby.end_game();
        self.transport.write_to_all(Packet::GameEnded { winner_name });
    }

    /* Read-only queries */

    pub fn player_names(&self) -> Vec<String> {
        self.lobby().registry().player_names()
    }

    pub fn ready_player_names(&self) -> Vec<String> {
        self.lobby().registry().ready_names()
    }

    pub fn is_registered(&self, addr: &SocketAddr) -> bool {
        self.lobby().registry().name_of(addr).is_some()
    }

    pub fn rate_limited_addresses(&self) -> usize {
        lock(&self.ledger).tracked_addresses()
    }

    /// Runs `query` against the active round, if there is one
    pub fn with_game<R>(&self, query: impl FnOnce(&ServerGameModel) -> R) -> Option<R> {
        self.lobby().game().map(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{OutboundMessage, RecordingTransport};
    use shared::{CardColor, ConnectionRejectionReason, GameState, MAX_PLAYERS, STARTING_HAND_SIZE};
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn setup(config: ServerConfig) -> (PacketDispatcher, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = PacketDispatcher::new(&config, transport.clone());
        (dispatcher, transport)
    }

    fn connect(dispatcher: &PacketDispatcher, port: u16, name: &str, password: &str) {
        dispatcher.on_packet_received(
            addr(port),
            Packet::Connect {
                player_name: name.to_string(),
                server_password: password.to_string(),
            },
        );
    }

    fn num(color: CardColor, number: u8) -> Card {
        Card::Numbered { color, number }
    }

    /// Alice, Bob, Carol and Dave seated in that order, red 5 on top
    fn seated_round(hand: Vec<Card>) -> (PacketDispatcher, Arc<RecordingTransport>) {
        let (dispatcher, transport) = setup(ServerConfig::default());
        let names = ["Alice", "Bob", "Carol", "Dave"];
        for (i, name) in names.iter().enumerate() {
            connect(&dispatcher, 1 + i as u16, name, "");
        }

        let mut full_hand = hand;
        full_hand.push(num(CardColor::Green, 9));
        dispatcher.begin_round(ServerGameModel::from_parts(
            names.iter().map(|name| name.to_string()).collect(),
            vec![full_hand; 4],
            num(CardColor::Red, 5),
            vec![num(CardColor::Yellow, 1); 20],
        ));
        transport.take();
        (dispatcher, transport)
    }

    #[test]
    fn test_two_players_accepted_without_password() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        connect(&dispatcher, 2, "Bob", "");

        assert_eq!(dispatcher.player_names(), vec!["Alice", "Bob"]);
        let messages = transport.take();
        assert_eq!(
            RecordingTransport::packets_for(&messages, addr(2))[0],
            Packet::ConnectionAccepted {
                existing_player_names: vec!["Alice".to_string()],
                ready_player_names: vec![],
            }
        );
    }

    #[test]
    fn test_wrong_password_rejected_and_closed() {
        let (dispatcher, transport) = setup(ServerConfig::with_password("ABC123"));
        connect(&dispatcher, 1, "Alice", "XYZ");

        let messages = transport.take();
        assert_eq!(
            messages[0],
            OutboundMessage::SendPacket {
                packet: Packet::ConnectionRejected {
                    reason: ConnectionRejectionReason::IncorrectPassword
                },
                addr: addr(1),
            }
        );
        assert!(RecordingTransport::was_closed(&messages, addr(1)));
        assert!(dispatcher.player_names().is_empty());
    }

    #[test]
    fn test_taken_name_rejected() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        transport.take();
        connect(&dispatcher, 2, "Alice", "");

        let messages = transport.take();
        assert_eq!(
            RecordingTransport::packets_for(&messages, addr(2)),
            vec![Packet::ConnectionRejected {
                reason: ConnectionRejectionReason::UsernameAlreadyTaken
            }]
        );
        assert!(RecordingTransport::was_closed(&messages, addr(2)));
        assert_eq!(dispatcher.player_names(), vec!["Alice"]);
    }

    #[test]
    fn test_full_lobby_still_starts_a_round() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        for i in 0..=MAX_PLAYERS {
            connect(&dispatcher, 100 + i as u16, &format!("P{}", i), "");
        }

        let late = addr(100 + MAX_PLAYERS as u16);
        let messages = transport.take();
        assert!(messages.contains(&OutboundMessage::SendPacket {
            packet: Packet::ConnectionRejected {
                reason: ConnectionRejectionReason::LobbyFull
            },
            addr: late,
        }));
        assert!(RecordingTransport::was_closed(&messages, late));
        assert_eq!(dispatcher.player_names().len(), MAX_PLAYERS);

        for i in 0..MAX_PLAYERS {
            dispatcher.on_packet_received(
                addr(100 + i as u16),
                Packet::PlayerReadyChanged {
                    player_name: String::new(),
                    ready: true,
                },
            );
        }

        assert_eq!(
            dispatcher.with_game(|game| game.card_counts()),
            Some(vec![STARTING_HAND_SIZE; MAX_PLAYERS])
        );
    }

    #[test]
    fn test_reading_stops_once_connection_is_closed() {
        let (dispatcher, _transport) = setup(ServerConfig::with_password("ABC123"));
        let handshake = |port: u16, password: &str| {
            dispatcher.on_packet_received(
                addr(port),
                Packet::Connect {
                    player_name: format!("P{}", port),
                    server_password: password.to_string(),
                },
            )
        };

        assert!(!handshake(1, "XYZ"));
        assert!(handshake(2, "ABC123"));
        assert!(!handshake(2, "ABC123"));
        assert!(dispatcher.on_packet_received(addr(2), Packet::DrawCards));
        assert!(!dispatcher.on_packet_received(addr(3), Packet::DrawCards));
    }

    #[test]
    fn test_second_handshake_is_fatal() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        transport.take();
        connect(&dispatcher, 1, "Alicia", "");

        assert!(RecordingTransport::was_closed(&transport.take(), addr(1)));
        assert_eq!(dispatcher.player_names(), vec!["Alice"]);
    }

    #[test]
    fn test_chat_is_attributed_and_relayed_to_everyone() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        connect(&dispatcher, 2, "Bob", "");
        transport.take();

        dispatcher.on_packet_received(
            addr(1),
            Packet::ChatMessage {
                sender_name: "Bob".to_string(),
                message: "hi".to_string(),
            },
        );

        let messages = transport.take();
        assert_eq!(
            messages,
            vec![OutboundMessage::BroadcastPacket {
                packet: Packet::ChatMessage {
                    sender_name: "Alice".to_string(),
                    message: "hi".to_string(),
                },
                exclude: None,
            }]
        );
    }

    #[test]
    fn test_chat_before_handshake_is_fatal() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        let err = dispatcher
            .handle(
                addr(1),
                Packet::ChatMessage {
                    sender_name: "Alice".to_string(),
                    message: "hi".to_string(),
                },
            )
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(transport.take().is_empty());
    }

    #[test]
    fn test_server_only_packet_is_fatal() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        transport.take();

        dispatcher.on_packet_received(
            addr(1),
            Packet::Notice {
                message: "forged".to_string(),
            },
        );
        assert!(RecordingTransport::was_closed(&transport.take(), addr(1)));
    }

    #[test]
    fn test_chat_throttled_within_interval() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        transport.take();

        let chat = Packet::ChatMessage {
            sender_name: String::new(),
            message: "spam".to_string(),
        };
        assert!(dispatcher.handle(addr(1), chat.clone()).is_ok());
        let err = dispatcher.handle(addr(1), chat).unwrap_err();
        assert!(matches!(err, PacketError::Throttled { .. }));

        // Only the first chat was relayed
        assert_eq!(transport.take().len(), 1);
    }

    #[test]
    fn test_chat_accepted_after_interval() {
        let mut config = ServerConfig::default();
        config.rate_limits.chat = Duration::from_millis(20);
        let (dispatcher, _transport) = setup(config);
        connect(&dispatcher, 1, "Alice", "");

        let chat = Packet::ChatMessage {
            sender_name: String::new(),
            message: "again".to_string(),
        };
        assert!(dispatcher.handle(addr(1), chat.clone()).is_ok());
        std::thread::sleep(Duration::from_millis(30));
        assert!(dispatcher.handle(addr(1), chat).is_ok());
    }

    #[test]
    fn test_throttle_runs_before_attribution() {
        let (dispatcher, _transport) = setup(ServerConfig::default());
        let chat = Packet::ChatMessage {
            sender_name: String::new(),
            message: "x".to_string(),
        };
        assert!(dispatcher.handle(addr(1), chat.clone()).unwrap_err().is_fatal());
        assert!(matches!(
            dispatcher.handle(addr(1), chat),
            Err(PacketError::Throttled { .. })
        ));
    }

    #[test]
    fn test_ready_relayed_except_sender_and_round_starts() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        connect(&dispatcher, 2, "Bob", "");
        transport.take();

        dispatcher.on_packet_received(
            addr(1),
            Packet::PlayerReadyChanged {
                player_name: "Mallory".to_string(),
                ready: true,
            },
        );
        let messages = transport.take();
        assert_eq!(
            messages,
            vec![OutboundMessage::BroadcastPacket {
                packet: Packet::PlayerReadyChanged {
                    player_name: "Alice".to_string(),
                    ready: true,
                },
                exclude: Some(addr(1)),
            }]
        );
        assert_eq!(dispatcher.ready_player_names(), vec!["Alice"]);

        dispatcher.on_packet_received(
            addr(2),
            Packet::PlayerReadyChanged {
                player_name: String::new(),
                ready: true,
            },
        );
        let messages = transport.take();
        for port in [1, 2] {
            let started = RecordingTransport::packets_for(&messages, addr(port))
                .into_iter()
                .find(|packet| matches!(packet, Packet::GameStarted { .. }));
            match started {
                Some(Packet::GameStarted {
                    hand, player_names, ..
                }) => {
                    assert_eq!(hand.len(), STARTING_HAND_SIZE);
                    assert_eq!(player_names, vec!["Alice", "Bob"]);
                }
                _ => panic!("No GameStarted for port {}", port),
            }
        }
        assert!(dispatcher.with_game(|game| game.players().len()) == Some(2));
    }

    #[test]
    fn test_draw_two_stacking_through_packets() {
        let hand = vec![
            Card::DrawTwo {
                color: CardColor::Red,
            },
            Card::DrawTwo {
                color: CardColor::Blue,
            },
        ];
        let (dispatcher, transport) = seated_round(hand);

        dispatcher
            .handle(
                addr(1),
                Packet::PlayCard {
                    card_index: 0,
                    chosen_color: None,
                },
            )
            .unwrap();
        assert_eq!(
            dispatcher.with_game(|game| (game.state(), game.pending_draw())),
            Some((GameState::AwaitingDrawTwoResponse, 2))
        );

        dispatcher
            .handle(
                addr(2),
                Packet::PlayCard {
                    card_index: 1,
                    chosen_color: None,
                },
            )
            .unwrap();
        assert_eq!(
            dispatcher.with_game(|game| (game.state(), game.pending_draw())),
            Some((GameState::AwaitingDrawTwoResponse, 4))
        );
        transport.take();

        dispatcher.handle(addr(3), Packet::DrawCards).unwrap();
        assert_eq!(
            dispatcher.with_game(|game| (game.state(), game.current_player_name().to_string())),
            Some((GameState::AwaitingPlay, "Dave".to_string()))
        );

        let messages = transport.take();
        match &RecordingTransport::packets_for(&messages, addr(3))[0] {
            Packet::CardsDrawn { amount, cards, .. } => {
                assert_eq!(*amount, 4);
                assert_eq!(cards.len(), 4);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
        match &RecordingTransport::packets_for(&messages, addr(1))[0] {
            Packet::CardsDrawn { amount, cards, .. } => {
                assert_eq!(*amount, 4);
                assert!(cards.is_empty());
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_out_of_turn_play_keeps_connection() {
        let (dispatcher, transport) = seated_round(vec![num(CardColor::Red, 5)]);

        dispatcher.on_packet_received(
            addr(3),
            Packet::PlayCard {
                card_index: 0,
                chosen_color: None,
            },
        );

        let messages = transport.take();
        assert!(!RecordingTransport::was_closed(&messages, addr(3)));
        assert!(matches!(
            RecordingTransport::packets_for(&messages, addr(3))[0],
            Packet::Notice { .. }
        ));
        assert_eq!(dispatcher.with_game(|game| game.current_index()), Some(0));
    }

    #[test]
    fn test_color_choice_from_other_player_is_illegal() {
        let (dispatcher, _transport) = seated_round(vec![Card::Wild { chosen_color: None }]);

        dispatcher
            .handle(
                addr(1),
                Packet::PlayCard {
                    card_index: 0,
                    chosen_color: None,
                },
            )
            .unwrap();
        let err = dispatcher
            .handle(
                addr(2),
                Packet::ChooseColor {
                    color: CardColor::Blue,
                },
            )
            .unwrap_err();
        assert!(matches!(err, PacketError::IllegalState(_)));

        dispatcher
            .handle(
                addr(1),
                Packet::ChooseColor {
                    color: CardColor::Blue,
                },
            )
            .unwrap();
        assert_eq!(
            dispatcher.with_game(|game| game.current_player_name().to_string()),
            Some("Bob".to_string())
        );
    }

    #[test]
    fn test_game_action_without_round_is_illegal_state() {
        let (dispatcher, _transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        assert!(matches!(
            dispatcher.handle(addr(1), Packet::DrawCards),
            Err(PacketError::IllegalState(_))
        ));
    }

    #[test]
    fn test_winning_play_ends_round() {
        let (dispatcher, transport) = setup(ServerConfig::default());
        connect(&dispatcher, 1, "Alice", "");
        connect(&dispatcher, 2, "Bob", "");
        dispatcher.begin_round(ServerGameModel::from_parts(
            vec!["Alice".to_string(), "Bob".to_string()],
            vec![vec![num(CardColor::Red, 5)], vec![num(CardColor::Red, 2); 3]],
            num(CardColor::Red, 5),
            vec![num(CardColor::Yellow, 1); 10],
        ));
        transport.take();

        dispatcher
            .handle(
                addr(1),
                Packet::PlayCard {
                    card_index: 0,
                    chosen_color: None,
                },
            )
            .unwrap();

        let messages = transport.take();
        assert!(messages.contains(&OutboundMessage::BroadcastPacket {
            packet: Packet::GameEnded {
                winner_name: Some("Alice".to_string())
            },
            exclude: None,
        }));
        assert!(dispatcher.with_game(|_| ()).is_none());
    }

    #[test]
    fn test_disconnect_purges_and_stale_packets_are_bad() {
        let (dispatcher, transport) = seated_round(vec![num(CardColor::Red, 5)]);
        dispatcher.on_packet_received(
            addr(1),
            Packet::ChatMessage {
                sender_name: String::new(),
                message: "bye".to_string(),
            },
        );
        assert_eq!(dispatcher.rate_limited_addresses(), 1);

        dispatcher.on_connection_closed(addr(1));
        assert!(!dispatcher.is_registered(&addr(1)));
        assert_eq!(dispatcher.rate_limited_addresses(), 0);
        assert!(dispatcher.with_game(|_| ()).is_none());

        let messages = transport.take();
        assert!(messages.contains(&OutboundMessage::BroadcastPacket {
            packet: Packet::GameEnded { winner_name: None },
            exclude: None,
        }));

        let err = dispatcher.handle(addr(1), Packet::DrawCards).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_distribution_table() {
        assert_eq!(
            distribution_for(PacketKind::ChatMessage),
            Some(Distribution::ToAll)
        );
        assert_eq!(
            distribution_for(PacketKind::PlayerReadyChanged),
            Some(Distribution::ToAllExceptSender)
        );
        assert_eq!(distribution_for(PacketKind::PlayCard), None);
        assert_eq!(distribution_for(PacketKind::GameStarted), None);
    }
}
