// netdraw-api: transport for the netdraw topology editor (topology socket + inventory REST)

pub mod error;
pub mod inventory;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use inventory::{Host, InventoryClient, Page};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ReconnectConfig, SocketEvent, TopologySocket, test_url, topology_url};
