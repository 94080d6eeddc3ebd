use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

/// Three-axis reading; each axis may be missing on its own
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector3 {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Vector3 {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// One decoded telemetry reading
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub pressure: Option<f64>,
    pub acceleration: Option<Vector3>,
    pub angular_velocity: Option<Vector3>,
    pub temperature: Option<f64>,
    /// Arrival time on the receiver, not part of the payload
    pub captured_at: OffsetDateTime,
}

impl Sample {
    /// Sample with every field absent
    pub fn empty(captured_at: OffsetDateTime) -> Self {
        Sample {
            pressure: None,
            acceleration: None,
            angular_velocity: None,
            temperature: None,
            captured_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_none()
            && self.acceleration.is_none()
            && self.angular_velocity.is_none()
            && self.temperature.is_none()
    }

    /// Value carried for `channel`, if any
    pub fn value(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Pressure => self.pressure,
            Channel::AccelX => self.acceleration.and_then(|v| v.x),
            Channel::AccelY => self.acceleration.and_then(|v| v.y),
            Channel::AccelZ => self.acceleration.and_then(|v| v.z),
            Channel::GyroX => self.angular_velocity.and_then(|v| v.x),
            Channel::GyroY => self.angular_velocity.and_then(|v| v.y),
            Channel::GyroZ => self.angular_velocity.and_then(|v| v.z),
            Channel::Temperature => self.temperature,
        }
    }
}

/// Scalar series identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Pressure,
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
    Temperature,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::Pressure,
        Channel::AccelX,
        Channel::AccelY,
        Channel::AccelZ,
        Channel::GyroX,
        Channel::GyroY,
        Channel::GyroZ,
        Channel::Temperature,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Pressure => "pressure",
            Channel::AccelX => "accel.x",
            Channel::AccelY => "accel.y",
            Channel::AccelZ => "accel.z",
            Channel::GyroX => "gyro.x",
            Channel::GyroY => "gyro.y",
            Channel::GyroZ => "gyro.z",
            Channel::Temperature => "temperature",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown channel '{}'", s.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_lookup_per_axis() {
        let sample = Sample {
            acceleration: Some(Vector3 {
                x: Some(1.0),
                y: None,
                z: Some(-3.0),
            }),
            ..Sample::empty(OffsetDateTime::UNIX_EPOCH)
        };
        assert_eq!(sample.value(Channel::AccelX), Some(1.0));
        assert_eq!(sample.value(Channel::AccelY), None);
        assert_eq!(sample.value(Channel::AccelZ), Some(-3.0));
        assert_eq!(sample.value(Channel::GyroX), None);
    }

    #[test]
    fn test_channel_names_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.name().parse::<Channel>(), Ok(channel));
        }
        assert_eq!(" Gyro.Z ".parse::<Channel>(), Ok(Channel::GyroZ));
        assert!("humidity".parse::<Channel>().is_err());
    }
}
