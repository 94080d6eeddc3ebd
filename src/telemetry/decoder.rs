/// Notification payload decoding
use log::{debug, warn};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::DecodeError;
use crate::models::{Sample, Vector3};

// Wire keys sent by the sensor firmware
const KEY_PRESSURE: &str = "fsr";
const KEY_ACCEL: &str = "accel";
const KEY_GYRO: &str = "gyro";
const KEY_TEMPERATURE: &str = "temp";

/// Decode one notification payload into a sample
///
/// The payload is UTF-8 text holding a JSON object with the optional keys
/// `fsr`, `accel {x,y,z}`, `gyro {x,y,z}` and `temp`:
///
/// ```text
/// {"fsr":512,"accel":{"x":0.01,"y":-0.98,"z":0.12},"gyro":{"x":1.5,"y":0,"z":-2},"temp":24.5}
/// ```
///
/// Each field is extracted on its own. A field with the wrong type or a
/// non-finite number is left absent without failing the rest of the sample,
/// and unknown keys are ignored. Only text that is not UTF-8, or not a JSON
/// object, fails as a whole.
///
/// # Arguments
/// * `bytes` - Raw notification value from the characteristic
/// * `captured_at` - Arrival time assigned by the receiver
pub fn decode(bytes: &[u8], captured_at: OffsetDateTime) -> Result<Sample, DecodeError> {
    let malformed = |reason: String| DecodeError::Malformed {
        raw: bytes.to_vec(),
        reason,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| malformed(e.to_string()))?;
    // Firmware often sends C strings, so drop the terminator along with whitespace
    let text = text.trim_end_matches('\0').trim();

    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(other) => return Err(malformed(format!("expected object, got {}", kind(&other)))),
        Err(e) => return Err(malformed(e.to_string())),
    };

    Ok(Sample {
        pressure: number(&object, KEY_PRESSURE),
        acceleration: vector(&object, KEY_ACCEL),
        angular_velocity: vector(&object, KEY_GYRO),
        temperature: number(&object, KEY_TEMPERATURE),
        captured_at,
    })
}

/// Decode a payload, degrading malformed input to an all-absent sample
///
/// This is what the ingress path uses: a corrupt packet still produces a
/// display tick instead of being dropped.
pub fn decode_or_empty(bytes: &[u8], captured_at: OffsetDateTime) -> Sample {
    match decode(bytes, captured_at) {
        Ok(sample) => sample,
        Err(e) => {
            warn!("{}", e);
            debug!("Malformed payload bytes: {:02x?}", bytes);
            Sample::empty(captured_at)
        }
    }
}

fn number(object: &Map<String, Value>, key: &str) -> Option<f64> {
    object.get(key).and_then(finite)
}

fn vector(object: &Map<String, Value>, key: &str) -> Option<Vector3> {
    let axes = object.get(key)?.as_object()?;
    let v = Vector3 {
        x: number(axes, "x"),
        y: number(axes, "y"),
        z: number(axes, "z"),
    };
    (!v.is_empty()).then_some(v)
}

// Numbers are kept as text while parsing, so a literal that overflows f64
// only fails here, for its own field
fn finite(value: &Value) -> Option<f64> {
    value.as_f64().filter(|n| n.is_finite())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
