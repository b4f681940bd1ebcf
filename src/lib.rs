pub mod clock;
pub mod config;
pub mod engine;
pub mod net;
pub mod selfcheck;
pub mod snapshot;
pub mod table;
pub mod types;
pub mod wire;

pub use clock::{Clock, JitterSource, NoJitter, RandomJitter, SystemClock};
pub use config::{Config, ConfigError, Neighbour};
pub use engine::Engine;
pub use net::{BindError, IngressEvent};
pub use selfcheck::{ConvergenceReport, ExpectedRoute};
pub use table::{RouteInfo, RoutingTable, TableError, UpsertFields};
pub use types::{Cost, Port, RangeError, RouterId};
pub use wire::{ResponsePacket, WireError};
