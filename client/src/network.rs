//! Client network layer: TCP connection, handshake and the terminal loop

use crate::game::ClientGameModel;
use crate::input::{parse_command, Command, CommandError, HELP};
use crate::rendering::{describe_event, render_hand, render_status};
use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, ConnectionRejectionReason, Packet, PacketKind};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("connection rejected: {0}")]
    Rejected(ConnectionRejectionReason),
    #[error("server closed the connection during the handshake")]
    ClosedDuringHandshake,
    #[error("unexpected {0} during the handshake")]
    UnexpectedPacket(PacketKind),
}

/// Sends `Connect` and waits for the server's verdict
///
/// Returns the `ConnectionAccepted` packet on success.
pub async fn handshake<S>(
    stream: &mut S,
    player_name: &str,
    password: &str,
) -> Result<Packet, ClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_packet(
        stream,
        &Packet::Connect {
            player_name: player_name.to_string(),
            server_password: password.to_string(),
        },
    )
    .await?;

    match read_packet(stream).await? {
        Some(accepted @ Packet::ConnectionAccepted { .. }) => Ok(accepted),
        Some(Packet::ConnectionRejected { reason }) => Err(ClientError::Rejected(reason)),
        Some(other) => Err(ClientError::UnexpectedPacket(other.kind())),
        None => Err(ClientError::ClosedDuringHandshake),
    }
}

pub struct Client {
    writer: OwnedWriteHalf,
    incoming: mpsc::UnboundedReceiver<Packet>,
    model: ClientGameModel,
}

impl Client {
    pub async fn connect(
        server_addr: &str,
        player_name: &str,
        password: &str,
    ) -> Result<Self, ClientError> {
        info!("Connecting to {}...", server_addr);
        let mut stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;

        let accepted = handshake(&mut stream, player_name, password).await?;
        let mut model = ClientGameModel::new(player_name);
        model.apply(&accepted);
        info!("Connected as {}", player_name);

        let (reader, writer) = stream.into_split();
        let (packet_tx, incoming) = mpsc::unbounded_channel();
        tokio::spawn(Self::receive_loop(reader, packet_tx));

        Ok(Client {
            writer,
            incoming,
            model,
        })
    }

    /// Forwards decoded packets until the stream ends; dropping the sender
    /// tells the client the server is gone
    async fn receive_loop(mut reader: OwnedReadHalf, packet_tx: mpsc::UnboundedSender<Packet>) {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    if packet_tx.send(packet).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Server closed the stream");
                    break;
                }
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    break;
                }
            }
        }
    }

    pub fn model(&self) -> &ClientGameModel {
        &self.model
    }

    pub async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        write_packet(&mut self.writer, packet).await?;
        Ok(())
    }

    /// Waits for the next server packet and folds it into the mirror
    ///
    /// Returns `None` once the server has closed the connection.
    pub async fn next_packet(&mut self) -> Option<Packet> {
        let packet = self.incoming.recv().await?;
        self.model.apply(&packet);
        Some(packet)
    }

    /// Runs one terminal command; returns false when the user wants to quit
    pub async fn handle_line(&mut self, line: &str) -> Result<bool, ClientError> {
        match parse_command(line) {
            Ok(Command::Send(packet)) => {
                if let Packet::PlayerReadyChanged { ready, .. } = &packet {
                    if !self.model.in_round() {
                        self.model.set_own_ready(*ready);
                    }
                }
                self.send(&packet).await?;
            }
            Ok(Command::ShowHand) => println!("{}", render_hand(&self.model)),
            Ok(Command::Help) => println!("{}", HELP),
            Ok(Command::Quit) => return Ok(false),
            Err(CommandError::Empty) => {}
            Err(e) => println!("{}", e),
        }
        Ok(true)
    }

    /// Interleaves server events with commands typed on stdin until either
    /// side ends the session
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("{}", render_status(&self.model));
        println!("type 'help' for commands");

        loop {
            tokio::select! {
                packet = self.incoming.recv() => {
                    match packet {
                        Some(packet) => {
                            self.model.apply(&packet);
                            if let Some(line) = describe_event(&packet, &self.model) {
                                println!("{}", line);
                            }
                        }
                        None => {
                            warn!("Disconnected from server");
                            break;
                        }
                    }
                },

                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(&line).await? {
                                info!("Leaving the server");
                                break;
                            }
                        }
                        None => break,
                    }
                },
            }
        }

        Ok(())
    }
}
