//! Audio socket bridge library
//!
//! Accepts sound events over HTTP from the browser userscript and relays
//! them to TCP consumers in the game plugin's wire format.

pub mod config;
pub mod ingest;
pub mod state;

pub use config::BridgeConfig;
pub use state::{BridgeState, KindFilter};
