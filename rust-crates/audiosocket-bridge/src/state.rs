//! Process-wide bridge state shared by the ingestion endpoint

use std::sync::atomic::{AtomicU64, Ordering};

use audiosocket_broadcaster::{encode_frame, Event, Frame, SoundKind, SubscriberRegistry};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;

/// Which kinds of sound are relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFilter {
    pub sound_effects: bool,
    pub area_sounds: bool,
}

impl KindFilter {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            sound_effects: config.include_sound_effects,
            area_sounds: config.include_area_sounds,
        }
    }

    fn allows(&self, kind: &SoundKind) -> bool {
        match kind {
            SoundKind::Point => self.sound_effects,
            SoundKind::Area(_) => self.area_sounds,
            SoundKind::Other(_) => true,
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self {
            sound_effects: true,
            area_sounds: true,
        }
    }
}

/// Subscriber registry plus the running event counter.
///
/// Built once at startup and handed to every component that needs it.
#[derive(Debug)]
pub struct BridgeState {
    registry: SubscriberRegistry,
    event_count: AtomicU64,
    filter: KindFilter,
}

impl BridgeState {
    pub fn new(registry: SubscriberRegistry, filter: KindFilter) -> Self {
        Self {
            registry,
            event_count: AtomicU64::new(0),
            filter,
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Number of producer events accepted so far
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::SeqCst)
    }

    /// Claim the next event number; unique and increasing across threads
    fn next_event_number(&self) -> u64 {
        self.event_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Normalize one producer payload and broadcast it.
    ///
    /// Every parsed payload consumes an event number, which doubles as the
    /// `soundId` when the producer sent none. Payloads that fail to parse or
    /// normalize are dropped. Returns the event that was broadcast.
    pub fn ingest(&self, body: &[u8]) -> Option<Event> {
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) => {
                debug!("Dropping producer payload: not a JSON object");
                return None;
            }
            Err(e) => {
                debug!("Dropping producer payload: {}", e);
                return None;
            }
        };

        let number = self.next_event_number();
        let event = match Event::from_fields(&fields, Some(number)) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping event #{}: {}", number, e);
                return None;
            }
        };

        if !self.filter.allows(&event.kind) {
            debug!("Event #{} filtered ({})", number, event.kind.type_name());
            return None;
        }

        let tag = match event.extra_str("attackType") {
            Some(attack) => format!("[SOL {}]", attack),
            None => "[SOUND]".to_string(),
        };
        let file = event.extra_str("soundFile").unwrap_or("unknown");
        info!("{} #{} {} (id={})", tag, number, file, event.sound_id);

        match encode_frame(&event) {
            Ok(line) => {
                let delivered = self.registry.broadcast(&Frame::from(line));
                debug!("Event #{} queued for {} subscriber(s)", number, delivered);
            }
            Err(e) => warn!("Failed to encode event #{}: {}", number, e),
        }

        Some(event)
    }
}
