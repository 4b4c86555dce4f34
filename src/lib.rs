pub mod config;
pub mod dns;
pub mod error;
pub mod forwarder;
pub mod resolver;
pub mod server;
pub mod zone;

pub use dns::DNSPacket;
