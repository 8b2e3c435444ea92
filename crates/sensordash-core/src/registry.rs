//! Static sensor type registry.
//!
//! Each measurement name maps to exactly one [`SensorTypeDescriptor`]. The
//! table is closed: measurements that are not listed here are unroutable and
//! never produce a card.

#![allow(missing_docs)]

use crate::doors::DoorState;

/// Rendering family of a sensor, and the single dispatch point for parsing
/// and buffering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Numeric magnitude shown on a gauge, buffered as a time series.
    Continuous,
    /// Two-state sensor, buffered as a state-change log.
    Discrete,
}

impl SensorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "gauge",
            Self::Discrete => "binary",
        }
    }
}

/// Result of running a payload through a descriptor's parser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedValue {
    /// Continuous reading. `NaN` marks an unparseable payload.
    Magnitude(f64),
    /// Discrete reading.
    State(DoorState),
}

impl ParsedValue {
    /// Returns the magnitude, or `None` for discrete values and the `NaN`
    /// sentinel.
    #[must_use]
    pub fn magnitude(self) -> Option<f64> {
        match self {
            Self::Magnitude(value) if !value.is_nan() => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn state(self) -> Option<DoorState> {
        match self {
            Self::State(state) => Some(state),
            Self::Magnitude(_) => None,
        }
    }
}

/// Colour band on a gauge dial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeZone {
    pub min: f64,
    pub max: f64,
    pub color: &'static str,
}

/// Gauge rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeRender {
    pub min: f64,
    pub max: f64,
    pub zones: &'static [GaugeZone],
}

impl GaugeRender {
    /// Zone containing `value`, clamped to the dial range.
    #[must_use]
    pub fn zone_for(&self, value: f64) -> Option<&'static GaugeZone> {
        if value.is_nan() {
            return None;
        }
        let clamped = value.clamp(self.min, self.max);
        self.zones
            .iter()
            .find(|zone| clamped >= zone.min && clamped < zone.max)
            .or_else(|| self.zones.last().filter(|zone| clamped >= zone.min))
    }
}

/// Label and colour for one discrete state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateStyle {
    pub label: &'static str,
    pub color: &'static str,
}

/// Binary rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryRender {
    pub open: StateStyle,
    pub closed: StateStyle,
}

impl BinaryRender {
    #[must_use]
    pub fn style_for(&self, state: DoorState) -> &StateStyle {
        match state {
            DoorState::Open => &self.open,
            DoorState::Closed => &self.closed,
        }
    }
}

/// Declared rendering strategy. Drawing itself happens outside this crate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderConfig {
    Gauge(GaugeRender),
    Binary(BinaryRender),
}

/// Static description of one measurement type.
#[derive(Debug, PartialEq)]
pub struct SensorTypeDescriptor {
    /// Measurement name, the last topic segment.
    pub measurement: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub kind: SensorKind,
    pub render: RenderConfig,
}

impl SensorTypeDescriptor {
    /// Parses a raw stream payload according to the sensor kind.
    #[must_use]
    pub fn parse_value(&self, payload: &str) -> ParsedValue {
        match self.kind {
            SensorKind::Continuous => ParsedValue::Magnitude(parse_magnitude(payload)),
            SensorKind::Discrete => ParsedValue::State(DoorState::parse(payload)),
        }
    }

    #[must_use]
    pub fn gauge(&self) -> Option<&GaugeRender> {
        match &self.render {
            RenderConfig::Gauge(gauge) => Some(gauge),
            RenderConfig::Binary(_) => None,
        }
    }

    #[must_use]
    pub fn binary(&self) -> Option<&BinaryRender> {
        match &self.render {
            RenderConfig::Binary(binary) => Some(binary),
            RenderConfig::Gauge(_) => None,
        }
    }
}

static TEMPERATURE_ZONES: [GaugeZone; 5] = [
    GaugeZone {
        min: -5.0,
        max: 10.0,
        color: "#3498db",
    },
    GaugeZone {
        min: 10.0,
        max: 18.0,
        color: "#2ecc71",
    },
    GaugeZone {
        min: 18.0,
        max: 24.0,
        color: "#4ecca3",
    },
    GaugeZone {
        min: 24.0,
        max: 30.0,
        color: "#f39c12",
    },
    GaugeZone {
        min: 30.0,
        max: 50.0,
        color: "#e23e57",
    },
];

static DESCRIPTORS: [SensorTypeDescriptor; 2] = [
    SensorTypeDescriptor {
        measurement: "temp",
        label: "Temperatura",
        unit: "°C",
        kind: SensorKind::Continuous,
        render: RenderConfig::Gauge(GaugeRender {
            min: -5.0,
            max: 50.0,
            zones: &TEMPERATURE_ZONES,
        }),
    },
    SensorTypeDescriptor {
        measurement: "door",
        label: "Puerta",
        unit: "",
        kind: SensorKind::Discrete,
        render: RenderConfig::Binary(BinaryRender {
            open: StateStyle {
                label: "Abierta",
                color: "#e23e57",
            },
            closed: StateStyle {
                label: "Cerrada",
                color: "#4ecca3",
            },
        }),
    },
];

/// Looks up the descriptor registered for `measurement`.
#[must_use]
pub fn resolve(measurement: &str) -> Option<&'static SensorTypeDescriptor> {
    DESCRIPTORS
        .iter()
        .find(|descriptor| descriptor.measurement == measurement)
}

/// All registered descriptors.
#[must_use]
pub fn descriptors() -> &'static [SensorTypeDescriptor] {
    &DESCRIPTORS
}

/// Parses a continuous payload: a bare number, a JSON scalar, or a JSON
/// object with a `value` field. Returns `NaN` when nothing numeric is found.
#[must_use]
pub fn parse_magnitude(payload: &str) -> f64 {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Object(map)) => map.get("value").map_or(f64::NAN, json_number),
        Ok(value) => json_number(&value),
        Err(_) => parse_number_prefix(payload),
    }
}

fn json_number(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(text) => parse_number_prefix(text),
        _ => f64::NAN,
    }
}

/// Lenient numeric parse: the longest decimal prefix after leading
/// whitespace, so `"21.5 C"` reads as `21.5`.
#[must_use]
pub fn parse_number_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }
    if digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().unwrap_or(f64::NAN)
}
