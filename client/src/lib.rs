//! # Card Game Client Library
//!
//! This library provides a headless terminal client for the multiplayer card
//! game server. It connects over TCP, performs the password and name
//! handshake, turns typed commands into packets and keeps a local mirror of
//! the lobby and the round built from server events.
//!
//! ## Architecture Overview
//!
//! The server is authoritative for everything. The client never predicts the
//! outcome of its own moves: it sends an intention such as "play my second
//! card" and waits for the resulting `CardPlayed`, `CardsDrawn` or `Notice`
//! packet before its mirror changes.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The client-side mirror:
//! - Lobby membership and ready flags
//! - Own hand, everyone's card count, top card and turn
//! - The same read-only queries the server exposes over its own model
//!
//! ### Input Module (`input`)
//! Line commands typed by the player and the packets they become.
//!
//! ### Network Module (`network`)
//! TCP connection, handshake and the loop interleaving server events with
//! terminal input.
//!
//! ### Rendering Module (`rendering`)
//! Text output of the mirror and of incoming events.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080", "Alice", "").await?;
//!
//!     // Reads commands from stdin and prints events until the user quits
//!     // or the server goes away
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
