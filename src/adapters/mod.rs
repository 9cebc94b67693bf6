// Adapters layer: concrete implementations of the remote port.

pub mod http;
pub mod memory;

pub use http::{HttpRemoteClient, HttpRemoteSettings};
pub use memory::InMemoryRemote;
