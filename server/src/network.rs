//! Server network layer handling TCP connections
//!
//! Every accepted stream gets two tasks. The reader decodes frames and hands
//! them to the dispatcher; the writer drains a per-connection queue. The
//! dispatcher never touches a socket directly: it talks to the
//! [`ConnectionTable`], which only enqueues, so it can be called while the
//! lobby lock is held.

use crate::config::ServerConfig;
use crate::dispatcher::PacketDispatcher;
use crate::transport::Transport;
use log::{debug, error, info, warn};
use shared::{read_packet, write_packet, Packet};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

/// Messages sent from the dispatcher to a connection's writer task
#[derive(Debug)]
pub enum ConnectionMessage {
    Write(Packet),
    Close,
}

/// Outbound queues of every open connection
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: RwLock<HashMap<SocketAddr, mpsc::UnboundedSender<ConnectionMessage>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, addr: SocketAddr, sender: mpsc::UnboundedSender<ConnectionMessage>) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(addr, sender);
    }

    fn remove(&self, addr: &SocketAddr) {
        self.connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(addr);
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn send(&self, addr: SocketAddr, message: ConnectionMessage) {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        match connections.get(&addr) {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!("Connection {} is already shutting down", addr);
                }
            }
            None => debug!("No open connection for {}", addr),
        }
    }

    fn broadcast(&self, packet: &Packet, exclude: Option<SocketAddr>) {
        let connections = self.connections.read().unwrap_or_else(PoisonError::into_inner);
        for (addr, sender) in connections.iter() {
            if Some(*addr) == exclude {
                continue;
            }
            if sender.send(ConnectionMessage::Write(packet.clone())).is_err() {
                debug!("Connection {} is already shutting down", addr);
            }
        }
    }
}

impl Transport for ConnectionTable {
    fn write_to(&self, addr: SocketAddr, packet: Packet) {
        self.send(addr, ConnectionMessage::Write(packet));
    }

    fn write_to_all(&self, packet: Packet) {
        self.broadcast(&packet, None);
    }

    fn write_to_all_except(&self, packet: Packet, addr: SocketAddr) {
        self.broadcast(&packet, Some(addr));
    }

    fn close_connection(&self, addr: SocketAddr) {
        self.send(addr, ConnectionMessage::Close);
    }
}

/// TCP host in front of the packet dispatcher
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<PacketDispatcher>,
    connections: Arc<ConnectionTable>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let connections = Arc::new(ConnectionTable::new());
        let dispatcher = Arc::new(PacketDispatcher::new(config, connections.clone()));

        Ok(Server {
            listener,
            dispatcher,
            connections,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<PacketDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Accepts connections forever
    pub async fn run(&self) -> std::io::Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accepts connections until `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_connection(stream, addr),
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle for {}: {}", addr, e);
        }

        let (reader, writer) = stream.into_split();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        self.connections.insert(addr, message_tx);
        self.dispatcher.on_new_connection(addr);

        tokio::spawn(Self::write_loop(writer, message_rx, closed_tx, addr));

        let dispatcher = Arc::clone(&self.dispatcher);
        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            Self::read_loop(reader, closed_rx, &dispatcher, addr).await;
            connections.remove(&addr);
            dispatcher.on_connection_closed(addr);
        });
    }

    /// Feeds decoded packets to the dispatcher until the peer goes away or
    /// the writer closes the connection
    async fn read_loop(
        mut reader: OwnedReadHalf,
        mut closed_rx: oneshot::Receiver<()>,
        dispatcher: &PacketDispatcher,
        addr: SocketAddr,
    ) {
        loop {
            tokio::select! {
                result = read_packet(&mut reader) => {
                    match result {
                        Ok(Some(packet)) => {
                            if !dispatcher.on_packet_received(addr, packet) {
                                debug!("Stopped reading from {} after closing it", addr);
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("{} closed the connection", addr);
                            break;
                        }
                        Err(e) => {
                            warn!("Dropping {} after a malformed frame: {}", addr, e);
                            break;
                        }
                    }
                },

                _ = &mut closed_rx => {
                    debug!("Stopped reading from {}", addr);
                    break;
                }
            }
        }
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut message_rx: mpsc::UnboundedReceiver<ConnectionMessage>,
        closed_tx: oneshot::Sender<()>,
        addr: SocketAddr,
    ) {
        while let Some(message) = message_rx.recv().await {
            match message {
                ConnectionMessage::Write(packet) => {
                    if let Err(e) = write_packet(&mut writer, &packet).await {
                        error!("Failed to send {} to {}: {}", packet.kind(), addr, e);
                        break;
                    }
                }
                ConnectionMessage::Close => {
                    debug!("Closing connection to {}", addr);
                    break;
                }
            }
        }

        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of {} failed: {}", addr, e);
        }
        let _ = closed_tx.send(());
    }
}
