//! Console handlers for decoded sound events

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use audiosocket_broadcaster::{Event, EventHandler, SoundKind};
use chrono::Local;

/// An [`EventHandler`] picked at startup, with an optional exit report
pub trait ConsumerHandler: EventHandler {
    /// Text to print once the stream ends
    fn summary(&self) -> Option<String> {
        None
    }
}

/// Prints one line per event
#[derive(Debug, Default)]
pub struct PrintHandler;

impl EventHandler for PrintHandler {
    fn on_event(&mut self, event: &Event) {
        println!("{} {}", Local::now().format("%H:%M:%S"), describe(event));
    }
}

impl ConsumerHandler for PrintHandler {}

/// One-line rendering of an event
pub fn describe(event: &Event) -> String {
    let mut line = match &event.kind {
        SoundKind::Point => format!("[SFX]  id={} delay={}", event.sound_id, event.delay_millis),
        SoundKind::Area(area) => format!(
            "[AREA] id={} at ({},{}) range={}",
            event.sound_id, area.scene_x, area.scene_y, area.range
        ),
        SoundKind::Other(name) => format!("[{}] id={}", name, event.sound_id),
    };

    if let Some(source) = event.source_name() {
        let _ = write!(line, " source={}", source);
    }
    if let Some(animation) = event.source_animation() {
        let _ = write!(line, " anim={}", animation);
    }
    if let Some(attack) = event.extra_str("attackType") {
        let _ = write!(line, " attack={}", attack);
    }
    line
}

/// What discovery mode has seen of one sound id
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SoundStats {
    pub count: u64,
    pub last_type: String,
    pub sources: BTreeSet<String>,
    pub animations: BTreeSet<i64>,
}

/// Tracks every distinct sound id with its sources and animations
#[derive(Debug, Default)]
pub struct DiscoveryHandler {
    seen: BTreeMap<u64, SoundStats>,
}

impl DiscoveryHandler {
    pub fn stats(&self, sound_id: u64) -> Option<&SoundStats> {
        self.seen.get(&sound_id)
    }

    pub fn distinct_sounds(&self) -> usize {
        self.seen.len()
    }

    fn record(&mut self, event: &Event) -> &SoundStats {
        let entry = self.seen.entry(event.sound_id).or_default();
        entry.count += 1;
        entry.last_type = event.kind.type_name().to_string();
        if let Some(source) = event.source_name() {
            entry.sources.insert(source.to_string());
        }
        if let Some(animation) = event.source_animation() {
            entry.animations.insert(animation);
        }
        entry
    }

    /// Sorted report of every sound id observed
    pub fn report(&self) -> String {
        let rule = "=".repeat(70);
        let mut out = format!(
            "{}\nDISCOVERY SUMMARY - All unique sound IDs observed:\n{}\n",
            rule, rule
        );

        for (sound_id, stats) in &self.seen {
            let sources = if stats.sources.is_empty() {
                "none".to_string()
            } else {
                stats.sources.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            let animations = if stats.animations.is_empty() {
                "none".to_string()
            } else {
                stats
                    .animations
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let _ = writeln!(
                out,
                "  {:>6}: count={:<5} type={:<20} sources=[{}] anims=[{}]",
                sound_id, stats.count, stats.last_type, sources, animations
            );
        }

        out.push_str(&rule);
        out
    }
}

impl EventHandler for DiscoveryHandler {
    fn on_event(&mut self, event: &Event) {
        let count = self.record(event).count;
        println!("{} [seen {}x]", describe(event), count);
    }
}

impl ConsumerHandler for DiscoveryHandler {
    fn summary(&self) -> Option<String> {
        Some(self.report())
    }
}
