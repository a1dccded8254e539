use serde_json::{Map, Value};

use crate::error::NormalizationError;

/// Wire name of a point (positionless) sound effect.
pub const POINT_SOUND_TYPE: &str = "SOUND_EFFECT";

/// Wire name of an area sound effect.
pub const AREA_SOUND_TYPE: &str = "AREA_SOUND_EFFECT";

/// Audible radius, in tiles, used when a producer omits `range`.
pub const DEFAULT_AREA_RANGE: i64 = 15;

/// Animation id meaning "the source actor is not animating".
pub const NO_ANIMATION: i64 = -1;

const KEY_TYPE: &str = "type";
const KEY_SOUND_ID: &str = "soundId";
const KEY_DELAY: &str = "delay";
const KEY_TIMESTAMP: &str = "timestamp";
const KEY_SOURCE_NAME: &str = "sourceName";
const KEY_SOURCE_ANIMATION: &str = "sourceAnimation";
const KEY_SCENE_X: &str = "sceneX";
const KEY_SCENE_Y: &str = "sceneY";
const KEY_RANGE: &str = "range";

const COMMON_KEYS: [&str; 6] = [
    KEY_TYPE,
    KEY_SOUND_ID,
    KEY_DELAY,
    KEY_TIMESTAMP,
    KEY_SOURCE_NAME,
    KEY_SOURCE_ANIMATION,
];
const AREA_KEYS: [&str; 3] = [KEY_SCENE_X, KEY_SCENE_Y, KEY_RANGE];

/// Scene position of an area sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaInfo {
    pub scene_x: i64,
    pub scene_y: i64,
    pub range: i64,
}

/// What kind of sound an event describes.
///
/// Only area sounds carry a position, so the spatial fields live inside
/// [`SoundKind::Area`]. Kinds this crate does not know are kept by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoundKind {
    Point,
    Area(AreaInfo),
    Other(String),
}

impl SoundKind {
    /// Name used in the `type` field on the wire
    pub fn type_name(&self) -> &str {
        match self {
            SoundKind::Point => POINT_SOUND_TYPE,
            SoundKind::Area(_) => AREA_SOUND_TYPE,
            SoundKind::Other(name) => name,
        }
    }

    pub fn is_area(&self) -> bool {
        matches!(self, SoundKind::Area(_))
    }
}

/// A normalized sound event, as relayed to every consumer.
///
/// Fields the relay does not interpret (`soundFile`, `attackType`, ...) are
/// carried untouched as pass-through fields. The source and pass-through
/// fields are only set through the builders, so an event always survives
/// encoding unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: SoundKind,
    pub sound_id: u64,
    pub delay_millis: i64,
    pub timestamp_millis: Option<i64>,
    source_name: Option<String>,
    source_animation: Option<i64>,
    extra: Map<String, Value>,
}

impl Event {
    fn with_kind(kind: SoundKind, sound_id: u64) -> Self {
        Self {
            kind,
            sound_id,
            delay_millis: 0,
            timestamp_millis: None,
            source_name: None,
            source_animation: None,
            extra: Map::new(),
        }
    }

    /// Point sound with every optional field at its default
    pub fn point(sound_id: u64) -> Self {
        Self::with_kind(SoundKind::Point, sound_id)
    }

    /// Area sound at the given scene position
    pub fn area(sound_id: u64, scene_x: i64, scene_y: i64, range: i64) -> Self {
        Self::with_kind(
            SoundKind::Area(AreaInfo {
                scene_x,
                scene_y,
                range,
            }),
            sound_id,
        )
    }

    /// Event of a kind this crate does not interpret
    pub fn other(type_name: impl Into<String>, sound_id: u64) -> Self {
        Self::with_kind(SoundKind::Other(type_name.into()), sound_id)
    }

    pub fn with_delay(mut self, delay_millis: i64) -> Self {
        self.delay_millis = delay_millis;
        self
    }

    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = Some(timestamp_millis);
        self
    }

    /// Empty names are treated as "no source".
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.source_name = (!name.is_empty()).then_some(name);
        self
    }

    /// [`NO_ANIMATION`] is treated as "no animation".
    pub fn with_source_animation(mut self, animation: i64) -> Self {
        self.source_animation = (animation != NO_ANIMATION).then_some(animation);
        self
    }

    /// Attach a pass-through field. Keys the event model owns are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !self.is_reserved_key(&key) {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn source_animation(&self) -> Option<i64> {
        self.source_animation
    }

    /// Pass-through fields, never including a key the event model owns
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// String value of a pass-through field, if present
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    pub fn area_info(&self) -> Option<&AreaInfo> {
        match &self.kind {
            SoundKind::Area(info) => Some(info),
            _ => None,
        }
    }

    fn is_reserved_key(&self, key: &str) -> bool {
        COMMON_KEYS.contains(&key) || (self.kind.is_area() && AREA_KEYS.contains(&key))
    }

    /// Build an event from producer fields.
    ///
    /// `fallback_id` stands in for a missing `soundId`; without one, a
    /// missing id is an error. A missing `type` means an area sound, whose
    /// position defaults to `(0, 0)` and range to [`DEFAULT_AREA_RANGE`].
    /// The input is never modified.
    pub fn from_fields(
        fields: &Map<String, Value>,
        fallback_id: Option<u64>,
    ) -> Result<Self, NormalizationError> {
        let type_name = match fields.get(KEY_TYPE) {
            None | Some(Value::Null) => AREA_SOUND_TYPE,
            Some(Value::String(name)) => name.as_str(),
            Some(other) => {
                return Err(NormalizationError::InvalidField {
                    field: KEY_TYPE,
                    reason: format!("expected a string, got {other}"),
                })
            }
        };

        let sound_id = match fields.get(KEY_SOUND_ID) {
            None | Some(Value::Null) => {
                fallback_id.ok_or(NormalizationError::MissingRequiredField(KEY_SOUND_ID))?
            }
            Some(value) => value.as_u64().ok_or_else(|| NormalizationError::InvalidField {
                field: KEY_SOUND_ID,
                reason: format!("expected a non-negative integer, got {value}"),
            })?,
        };

        let kind = match type_name {
            POINT_SOUND_TYPE => SoundKind::Point,
            AREA_SOUND_TYPE => SoundKind::Area(AreaInfo {
                scene_x: int_field(fields, KEY_SCENE_X)?.unwrap_or(0),
                scene_y: int_field(fields, KEY_SCENE_Y)?.unwrap_or(0),
                range: int_field(fields, KEY_RANGE)?.unwrap_or(DEFAULT_AREA_RANGE),
            }),
            other => SoundKind::Other(other.to_string()),
        };

        let source_name = match fields.get(KEY_SOURCE_NAME) {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if name.is_empty() => None,
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                return Err(NormalizationError::InvalidField {
                    field: KEY_SOURCE_NAME,
                    reason: format!("expected a string, got {other}"),
                })
            }
        };

        let mut event = Self::with_kind(kind, sound_id);
        event.delay_millis = int_field(fields, KEY_DELAY)?.unwrap_or(0);
        event.timestamp_millis = int_field(fields, KEY_TIMESTAMP)?;
        event.source_name = source_name;
        event.source_animation =
            int_field(fields, KEY_SOURCE_ANIMATION)?.filter(|anim| *anim != NO_ANIMATION);
        event.extra = fields
            .iter()
            .filter(|(key, _)| !event.is_reserved_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(event)
    }

    /// Flatten back into wire fields; inverse of [`Event::from_fields`].
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = self.extra.clone();
        fields.insert(KEY_TYPE.into(), Value::from(self.kind.type_name()));
        fields.insert(KEY_SOUND_ID.into(), Value::from(self.sound_id));
        fields.insert(KEY_DELAY.into(), Value::from(self.delay_millis));
        if let Some(timestamp) = self.timestamp_millis {
            fields.insert(KEY_TIMESTAMP.into(), Value::from(timestamp));
        }
        if let Some(name) = &self.source_name {
            fields.insert(KEY_SOURCE_NAME.into(), Value::from(name.as_str()));
        }
        if let Some(animation) = self.source_animation {
            fields.insert(KEY_SOURCE_ANIMATION.into(), Value::from(animation));
        }
        if let SoundKind::Area(info) = &self.kind {
            fields.insert(KEY_SCENE_X.into(), Value::from(info.scene_x));
            fields.insert(KEY_SCENE_Y.into(), Value::from(info.scene_y));
            fields.insert(KEY_RANGE.into(), Value::from(info.range));
        }
        fields
    }
}

/// Floats that convert to i64 without saturating
const I64_RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;

/// Integer field; whole floats such as `12.0` are accepted, null counts as absent
fn int_field(
    fields: &Map<String, Value>,
    key: &'static str,
) -> Result<Option<i64>, NormalizationError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| {
                value
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && I64_RANGE.contains(f))
                    .map(|f| f as i64)
            })
            .map(Some)
            .ok_or_else(|| NormalizationError::InvalidField {
                field: key,
                reason: format!("expected an integer, got {value}"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fields must be an object"),
        }
    }

    #[test]
    fn test_point_sound_defaults() {
        let raw = fields(json!({"type": "SOUND_EFFECT", "soundId": 2498}));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(event.kind, SoundKind::Point);
        assert_eq!(event.sound_id, 2498);
        assert_eq!(event.delay_millis, 0);
        assert_eq!(event.timestamp_millis, None);
        assert_eq!(event.source_name, None);
        assert!(event.extra.is_empty());
    }

    #[test]
    fn test_area_sound_range_defaults() {
        let raw = fields(json!({
            "type": "AREA_SOUND_EFFECT",
            "soundId": 7,
            "sceneX": 40,
            "sceneY": 52
        }));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(
            event.area_info(),
            Some(&AreaInfo {
                scene_x: 40,
                scene_y: 52,
                range: DEFAULT_AREA_RANGE
            })
        );
    }

    #[test]
    fn test_missing_type_is_area_sound() {
        let raw = fields(json!({"soundId": 1}));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(event.kind.type_name(), AREA_SOUND_TYPE);
        assert_eq!(event.area_info().map(|a| a.range), Some(15));
    }

    #[test]
    fn test_missing_sound_id_uses_fallback() {
        let raw = fields(json!({"type": "SOUND_EFFECT"}));

        let event = Event::from_fields(&raw, Some(41)).unwrap();
        assert_eq!(event.sound_id, 41);

        let err = Event::from_fields(&raw, None).unwrap_err();
        assert_eq!(err, NormalizationError::MissingRequiredField("soundId"));
    }

    #[test]
    fn test_negative_sound_id_rejected() {
        let raw = fields(json!({"soundId": -3}));
        let err = Event::from_fields(&raw, Some(1)).unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::InvalidField { field: "soundId", .. }
        ));
    }

    #[test]
    fn test_wrong_type_for_delay_rejected() {
        let raw = fields(json!({"soundId": 3, "delay": "soon"}));
        assert!(Event::from_fields(&raw, None).is_err());
    }

    #[test]
    fn test_whole_float_accepted() {
        let raw = fields(json!({"type": "SOUND_EFFECT", "soundId": 3, "delay": 20.0}));
        let event = Event::from_fields(&raw, None).unwrap();
        assert_eq!(event.delay_millis, 20);
    }

    #[test]
    fn test_out_of_range_float_rejected() {
        let raw = fields(json!({"type": "SOUND_EFFECT", "soundId": 3, "delay": 1e300}));
        assert!(matches!(
            Event::from_fields(&raw, None),
            Err(NormalizationError::InvalidField { field: "delay", .. })
        ));

        let raw = fields(json!({"type": "AREA_SOUND_EFFECT", "soundId": 3, "sceneX": -1e19}));
        assert!(Event::from_fields(&raw, None).is_err());
    }

    #[test]
    fn test_builder_sentinels_survive_round_trip() {
        let event = Event::point(1)
            .with_source_name("")
            .with_source_animation(NO_ANIMATION)
            .with_extra("soundFile", json!("ui.ogg"));

        assert_eq!(event.source_name(), None);
        assert_eq!(event.source_animation(), None);
        assert_eq!(Event::from_fields(&event.to_fields(), None).unwrap(), event);
    }

    #[test]
    fn test_source_sentinels_dropped() {
        let raw = fields(json!({
            "type": "SOUND_EFFECT",
            "soundId": 3,
            "sourceName": "",
            "sourceAnimation": -1
        }));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(event.source_name, None);
        assert_eq!(event.source_animation, None);
        assert!(!event.to_fields().contains_key("sourceAnimation"));
    }

    #[test]
    fn test_pass_through_fields_preserved() {
        let raw = fields(json!({
            "type": "AREA_SOUND_EFFECT",
            "soundId": 8145,
            "sourceName": "Sol Heredit",
            "sourceAnimation": 10883,
            "soundFile": "sol_spear_1.ogg",
            "attackType": "SPEAR",
            "nested": {"a": [1, 2]}
        }));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(event.extra_str("soundFile"), Some("sol_spear_1.ogg"));
        assert_eq!(event.extra_str("attackType"), Some("SPEAR"));
        assert_eq!(event.extra["nested"], json!({"a": [1, 2]}));
        assert_eq!(event.source_animation, Some(10883));

        let back = event.to_fields();
        assert_eq!(back["soundFile"], raw["soundFile"]);
        assert_eq!(back["nested"], raw["nested"]);
    }

    #[test]
    fn test_unknown_kind_keeps_spatial_fields_as_extra() {
        let raw = fields(json!({"type": "MUSIC_TRACK", "soundId": 5, "sceneX": 1}));
        let event = Event::from_fields(&raw, None).unwrap();

        assert_eq!(event.kind, SoundKind::Other("MUSIC_TRACK".into()));
        assert_eq!(event.extra["sceneX"], json!(1));
        assert_eq!(Event::from_fields(&event.to_fields(), None).unwrap(), event);
    }

    #[test]
    fn test_input_not_modified() {
        let raw = fields(json!({"soundId": 9, "sourceAnimation": -1}));
        let before = raw.clone();
        let _ = Event::from_fields(&raw, None).unwrap();
        assert_eq!(raw, before);
    }

    #[test]
    fn test_with_extra_ignores_reserved_keys() {
        let event = Event::area(1, 2, 3, 4)
            .with_extra("range", json!(99))
            .with_extra("attackType", json!("GRAPPLE"));

        assert_eq!(event.area_info().map(|a| a.range), Some(4));
        assert_eq!(event.extra.len(), 1);
    }
}
