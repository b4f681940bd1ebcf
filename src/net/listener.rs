//! Input listener: binds one datagram socket per configured input port and
//! forwards decoded response packets to the protocol engine over a channel.
//! Malformed datagrams are dropped here, before the engine ever sees them.

use crate::types::Port;
use crate::wire::ResponsePacket;
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
#[error("failed to bind input port {port}: {source}")]
pub struct BindError {
    pub port: Port,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug)]
pub struct IngressEvent {
    pub from_addr: SocketAddr,
    pub packet: ResponsePacket,
}

/// Binds every port in `ports` to loopback, then spawns one reader task per
/// socket. Bind failure is the caller's responsibility to treat as fatal.
pub async fn bind_all(ports: &[Port]) -> Result<Vec<UdpSocket>, BindError> {
    let mut sockets = Vec::with_capacity(ports.len());
    for &port in ports {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, port.get()))
            .await
            .map_err(|source| BindError { port, source })?;
        sockets.push(socket);
    }
    Ok(sockets)
}

/// Spawns one reader task per already-bound socket. Each task decodes
/// incoming datagrams and forwards valid ones over `tx`; malformed packets
/// are logged at `debug` and dropped.
pub fn spawn_readers(sockets: Vec<UdpSocket>, tx: mpsc::Sender<IngressEvent>) -> Vec<JoinHandle<()>> {
    sockets
        .into_iter()
        .map(|socket| {
            let tx = tx.clone();
            tokio::spawn(async move { read_loop(socket, tx).await })
        })
        .collect()
}

async fn read_loop(socket: UdpSocket, tx: mpsc::Sender<IngressEvent>) {
    let mut buf = vec![0u8; crate::wire::MIN_RECV_BUFFER * 4];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, from_addr)) => match ResponsePacket::decode(&buf[..len]) {
                Ok(packet) => {
                    if tx.send(IngressEvent { from_addr, packet }).await.is_err() {
                        tracing::debug!("ingress channel closed, stopping reader");
                        return;
                    }
                }
                Err(e) => {
                    tracing::debug!(%from_addr, error = %e, "dropped malformed packet");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "transient error reading input socket");
            }
        }
    }
}
