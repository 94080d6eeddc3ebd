use std::env;
use std::fmt::Display;
use std::str::FromStr;

use log::{debug, info};

use crate::error::{Result, TelemetryError};
use crate::models::Channel;
use crate::telemetry::MissingValuePolicy;

const DEFAULT_DEVICE_NAME: &str = "ESP32_Sensor";
const DEFAULT_SERVICE_UUID: &str = "4fafc201-1fb5-459e-8fcc-c5c9c331914b";
const DEFAULT_CHARACTERISTIC_UUID: &str = "beb5483e-36e1-4688-b7f5-ea07361b26a8";
const DEFAULT_MAX_POINTS: &str = "50";
const DEFAULT_MISSING_VALUE: &str = "zero";
const DEFAULT_RENDER_INTERVAL_MS: &str = "500";
const DEFAULT_SCAN_TIMEOUT_SECS: &str = "20";
const DEFAULT_AUTO_CONNECT: &str = "true";

/// Which peripheral to connect to and where its notifications live
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub device_name: String,
    pub service_uuid: bluer::Uuid,
    pub characteristic_uuid: bluer::Uuid,
    pub scan_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub link: LinkConfig,
    pub max_points: usize,
    pub channels: Vec<Channel>,
    pub missing_value: MissingValuePolicy,
    pub render_interval_ms: u64,
    pub auto_connect: bool,
}

impl TelemetryConfig {
    pub fn new() -> Result<Self> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; unset or blank keys take defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let setting = |key: &str, default: &str| {
            let value = lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
            match value {
                Some(value) => {
                    debug!("{} = '{}'", key, value);
                    (key.to_string(), value)
                }
                None => (key.to_string(), default.to_string()),
            }
        };

        let link = LinkConfig {
            device_name: setting("BLE_DEVICE_NAME", DEFAULT_DEVICE_NAME).1,
            service_uuid: parse(setting("BLE_SERVICE_UUID", DEFAULT_SERVICE_UUID))?,
            characteristic_uuid: parse(setting(
                "BLE_CHARACTERISTIC_UUID",
                DEFAULT_CHARACTERISTIC_UUID,
            ))?,
            scan_timeout_secs: parse(setting("SCAN_TIMEOUT_SECS", DEFAULT_SCAN_TIMEOUT_SECS))?,
        };

        let max_points: usize = parse(setting("TELEMETRY_MAX_POINTS", DEFAULT_MAX_POINTS))?;
        if max_points == 0 {
            return Err(TelemetryError::Config(
                "TELEMETRY_MAX_POINTS must be at least 1".to_string(),
            ));
        }

        let (_, channel_list) = setting("TELEMETRY_CHANNELS", "");
        let channels = if channel_list.is_empty() {
            Channel::ALL.to_vec()
        } else {
            parse_channels(&channel_list)?
        };

        let render_interval_ms: u64 =
            parse(setting("RENDER_INTERVAL_MS", DEFAULT_RENDER_INTERVAL_MS))?;

        let config = TelemetryConfig {
            link,
            max_points,
            channels,
            missing_value: parse(setting("TELEMETRY_MISSING_VALUE", DEFAULT_MISSING_VALUE))?,
            render_interval_ms: render_interval_ms.max(1),
            auto_connect: parse_bool(setting("AUTO_CONNECT", DEFAULT_AUTO_CONNECT))?,
        };

        info!(
            "Device '{}', {} channels, {} points, missing values: {}",
            config.link.device_name,
            config.channels.len(),
            config.max_points,
            config.missing_value
        );

        Ok(config)
    }
}

fn parse<T>((key, raw): (String, String)) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| TelemetryError::Config(format!("{}='{}': {}", key, raw, e)))
}

fn parse_bool((key, raw): (String, String)) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TelemetryError::Config(format!(
            "{}='{}' is not a boolean",
            key, raw
        ))),
    }
}

fn parse_channels(list: &str) -> Result<Vec<Channel>> {
    let channels = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Channel>().map_err(TelemetryError::Config))
        .collect::<Result<Vec<_>>>()?;
    if channels.is_empty() {
        return Err(TelemetryError::Config(
            "TELEMETRY_CHANNELS lists no channels".to_string(),
        ));
    }
    Ok(channels)
}
