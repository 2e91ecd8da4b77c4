//! # Card Game Server Library
//!
//! This library provides the authoritative server for a multiplayer UNO-style
//! card game. It owns the lobby and the round in progress, validates every
//! client packet against them, and tells each client only what it may know.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The server holds the deck, every hand and the turn state machine. Clients
//! send intentions ("play my third card"), never state, and conform to the
//! events the server broadcasts back.
//!
//! ### Connection Gatekeeping
//! Handles the lifecycle of every connection:
//! - Password check and unique player names at handshake time
//! - Ready tracking and automatic round start
//! - Cleanup of all per-connection state on disconnect
//!
//! ### Abuse Prevention
//! Every inbound packet passes the rate limiter before anything else, and
//! any identity a client claims inside a packet is replaced by the name it
//! registered with.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! Command-line arguments and the rate-limit intervals derived from them.
//!
//! ### Dispatcher Module (`dispatcher`)
//! The single choke point for inbound packets: throttle, attribute, route,
//! validate, mutate, relay.
//!
//! ### Game Module (`game`)
//! The round itself: dealing, playability, card effects, draw penalties,
//! challenges and the win condition.
//!
//! ### Lobby and Registry Modules (`lobby`, `registry`)
//! Who is connected under which name, who is ready, and which round is
//! running. The lobby sits behind one lock so each handshake or ready change
//! is atomic.
//!
//! ### Rate Limit Module (`rate_limit`)
//! Last accepted time per address and packet kind.
//!
//! ### Network and Transport Modules (`network`, `transport`)
//! TCP listener, per-connection reader and writer tasks, and the outbound
//! interface the dispatcher writes through.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::with_password("ABC123");
//!     let server = Server::new(&config).await?;
//!
//!     // Accepts players, starts a round once everyone is ready and
//!     // arbitrates it until the process is stopped
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Connections are served by independent tokio tasks that all call into one
//! shared [`dispatcher::PacketDispatcher`]. The lobby and the rate-limit
//! ledger are each guarded by their own mutex and are never locked together,
//! and outbound writes only enqueue, so no lock is held across an await.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod game;
pub mod lobby;
pub mod network;
pub mod rate_limit;
pub mod registry;
pub mod transport;
