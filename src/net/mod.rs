//! Datagram transport: binding input sockets and emitting neighbour updates.

pub mod emitter;
pub mod listener;

pub use listener::{BindError, IngressEvent};
