//! Real-time sound event broadcaster
//!
//! This crate relays game sound events to any number of TCP consumers and
//! provides the consumer-side reader for that stream.
//!
//! # Features
//!
//! - TCP server, default port 5150
//! - Newline-delimited JSON protocol, same field names as the game plugin
//! - Multiple concurrent consumers, each with its own ordered write queue
//! - Dead consumers are pruned without failing the broadcast
//! - Incremental frame decoder tolerant of split reads and bad lines
//!
//! # Frame Format
//!
//! ```text
//! {"delay":0,"soundId":2498,"type":"SOUND_EFFECT"}
//! {"delay":0,"range":15,"sceneX":40,"sceneY":52,"soundId":8145,"sourceName":"Sol Heredit","type":"AREA_SOUND_EFFECT"}
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use audiosocket_broadcaster::{Event, SoundBroadcaster};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broadcaster = SoundBroadcaster::new("127.0.0.1:5150");
//!     broadcaster.start().await?;
//!
//!     broadcaster.broadcast_event(&Event::point(2498));
//!     broadcaster.broadcast_event(&Event::area(8145, 40, 52, 15).with_source_name("Sol Heredit"));
//!
//!     broadcaster.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod listener;
pub mod reader;
pub mod registry;

// Re-exports
pub use codec::{decode_line, encode_frame, FrameDecoder};
pub use error::{BroadcasterError, FrameError, NormalizationError, Result};
pub use events::{AreaInfo, Event, SoundKind, DEFAULT_AREA_RANGE};
pub use listener::SoundBroadcaster;
pub use reader::{EventHandler, ReadOutcome, StreamReader};
pub use registry::{Frame, Subscriber, SubscriberId, SubscriberRegistry};
