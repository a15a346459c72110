//! Sensor block formatting.
//!
//! Readings are only turned into text for the prompt. Thresholds are described to the
//! model by the condition rules; nothing here compares values.

use serde::{de, Deserialize, Deserializer, Serialize};

/// Field list shown to users entering a free-form sensor block.
pub const SENSOR_FIELDS: &str = "\
- Distance (meters) - IR Sensor
- Temperature (°C)  - DHT 22
- Humidity (%)      - DHT 22
- Motion Sensor (0 or 1) - PIR Motion sensor
- PPM  - mq135
- Gyro Angle diff - 6 axis accel & Gyro sensor";

/// Empty sensor block with one line per field.
pub const SENSOR_TEMPLATE: &str = "\
Distance:
Temperature:
Humidity:
Motion Sensor (0 or 1):
PPM:
Gyro Angle diff:";

/// Structured sensor readings. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorReadings {
    /// IR sensor distance in meters.
    pub distance_m: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    /// PIR motion sensor. Accepts `true`/`false` or `1`/`0`.
    #[serde(deserialize_with = "deserialize_motion")]
    pub motion: Option<bool>,
    /// MQ135 air quality reading.
    pub ppm: Option<f64>,
    pub gyro_angle_diff: Option<f64>,
}

impl SensorReadings {
    /// Render present readings as `Label: value` lines in a fixed order.
    pub fn to_block(&self) -> String {
        let lines = [
            ("Distance", self.distance_m.map(format_number)),
            ("Temperature", self.temperature_c.map(format_number)),
            ("Humidity", self.humidity_pct.map(format_number)),
            (
                "Motion Sensor (0 or 1)",
                self.motion.map(|m| if m { "1" } else { "0" }.to_string()),
            ),
            ("PPM", self.ppm.map(format_number)),
            ("Gyro Angle diff", self.gyro_angle_diff.map(format_number)),
        ];

        lines
            .into_iter()
            .filter_map(|(label, value)| value.map(|v| format!("{}: {}", label, v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn deserialize_motion<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(0)) => Ok(Some(false)),
        Some(Flag::Int(1)) => Ok(Some(true)),
        Some(Flag::Int(n)) => Err(de::Error::custom(format!(
            "motion must be 0 or 1, got {}",
            n
        ))),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Merge a free-form sensor block with structured readings.
///
/// The free-form block comes first, unchanged when there are no structured readings;
/// otherwise the readings are appended on their own lines.
pub fn combine_sensor_text(block: Option<&str>, readings: &SensorReadings) -> String {
    let structured = readings.to_block();
    let block = block.unwrap_or_default();

    match (block.trim().is_empty(), structured.is_empty()) {
        (true, _) => structured,
        (false, true) => block.to_string(),
        (false, false) => format!("{}\n{}", block.trim_end(), structured),
    }
}
