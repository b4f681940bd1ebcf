//! Update emitter: composes a per-neighbour response packet (applying split
//! horizon with poisoned reverse) and sends it over a fresh ephemeral socket.
//! Sends are fire-and-forget: datagram loss is expected and corrected by the
//! next periodic broadcast, so there is no retry logic here.

use crate::config::Neighbour;
use crate::table::RoutingTable;
use crate::types::{Cost, RouterId};
use crate::wire::ResponsePacket;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tokio::net::UdpSocket;

/// Builds the packet this router should send to `neighbour_id`, covering the
/// destinations in `destinations` that are currently present in `table`.
pub fn build_packet(
    own_id: RouterId,
    neighbour_id: RouterId,
    table: &RoutingTable,
    destinations: &[RouterId],
) -> ResponsePacket {
    let mut packet = ResponsePacket::new(own_id);
    for &dest in destinations {
        let Some(route) = table.get(dest) else {
            continue;
        };
        let advertised_cost = if route.first_hop == neighbour_id {
            Cost::INFINITY
        } else {
            route.cost
        };
        packet.push(dest, advertised_cost);
    }
    packet
}

async fn send_datagram(port: crate::types::Port, bytes: &[u8]) -> std::io::Result<()> {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    socket.send_to(bytes, (Ipv4Addr::LOCALHOST, port.get())).await?;
    Ok(())
}

/// Sends one update datagram to every configured neighbour, each shaped by
/// that neighbour's own view (poisoned reverse differs per recipient).
pub async fn emit_update(
    own_id: RouterId,
    neighbours: &HashMap<RouterId, Neighbour>,
    table: &RoutingTable,
    destinations: &[RouterId],
) {
    for (&neighbour_id, neighbour) in neighbours {
        let packet = build_packet(own_id, neighbour_id, table, destinations);
        let bytes = packet.encode();
        if let Err(e) = send_datagram(neighbour.port, &bytes).await {
            tracing::warn!(neighbour = %neighbour_id, error = %e, "failed to send update datagram");
        }
    }
}
