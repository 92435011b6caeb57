//! AdaptoWeb relay: settings store and JSON-RPC bridge that adapts pages over stdio.

pub mod config;
pub mod pages;
pub mod protocol;
pub mod store;
pub mod transport;
pub mod types;

pub use config::resolve_settings_path;
pub use pages::PageRegistry;
pub use protocol::ProtocolHandler;
pub use store::SettingsStore;
pub use transport::StdioTransport;
