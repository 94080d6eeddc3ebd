/// Utility functions for formatting snapshots for display
use time::{format_description, OffsetDateTime};

use crate::models::{Channel, Sample};
use crate::telemetry::snapshot::{ChannelSeries, Snapshot};

const NOT_AVAILABLE: &str = "N/A";

/// Format a timestamp as a chart axis label
///
/// Converts an OffsetDateTime to HH:MM:SS format.
/// Falls back to default string representation if formatting fails.
pub fn format_time_label(dt: &OffsetDateTime) -> String {
    match format_description::parse("[hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Text for one readout field
///
/// A missing value and a reading of exactly zero both show as `N/A`, the
/// same way the dashboard has always displayed them.
pub fn readout(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 && !v.is_nan() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Labelled readouts for the latest sample, all `N/A` before the first one
pub fn format_readouts(sample: Option<&Sample>) -> Vec<(&'static str, String)> {
    let field = |channel| readout(sample.and_then(|s| s.value(channel)));
    vec![
        ("FSR", field(Channel::Pressure)),
        ("Accel X", field(Channel::AccelX)),
        ("Accel Y", field(Channel::AccelY)),
        ("Accel Z", field(Channel::AccelZ)),
        ("Gyro X", field(Channel::GyroX)),
        ("Gyro Y", field(Channel::GyroY)),
        ("Gyro Z", field(Channel::GyroZ)),
        ("Temp", field(Channel::Temperature)),
    ]
}

/// Lines printed by the `status` command
pub fn format_status(snapshot: &Snapshot, max_points: usize) -> Vec<String> {
    let buffered = if snapshot.is_empty() {
        format!("nothing buffered yet (room for {})", max_points)
    } else {
        format!("{} of {} points buffered", snapshot.len(), max_points)
    };
    vec![
        format!("Status: {}", snapshot.connection),
        format!(
            "  Connect {}, samples {}, {}",
            if snapshot.can_connect { "available" } else { "disabled" },
            if snapshot.routing_enabled { "routed" } else { "dropped" },
            buffered
        ),
    ]
}

/// Charts drawn by the front-end and the channels each one plots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    Acceleration,
    AngularVelocity,
    Pressure,
    /// Bar gauge showing only the newest value
    Temperature,
}

impl Chart {
    pub const ALL: [Chart; 4] = [
        Chart::Acceleration,
        Chart::AngularVelocity,
        Chart::Pressure,
        Chart::Temperature,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Chart::Acceleration => "Accel",
            Chart::AngularVelocity => "Gyro",
            Chart::Pressure => "FSR Pressure",
            Chart::Temperature => "Temperature (°C)",
        }
    }

    pub fn channels(self) -> &'static [Channel] {
        match self {
            Chart::Acceleration => &[Channel::AccelX, Channel::AccelY, Channel::AccelZ],
            Chart::AngularVelocity => &[Channel::GyroX, Channel::GyroY, Channel::GyroZ],
            Chart::Pressure => &[Channel::Pressure],
            Chart::Temperature => &[Channel::Temperature],
        }
    }
}

/// One-line summary of a chart's series, `None` if none of its channels are buffered
pub fn summarize_chart(chart: Chart, snapshot: &Snapshot) -> Option<String> {
    let parts: Vec<String> = chart
        .channels()
        .iter()
        .filter_map(|&channel| snapshot.series(channel))
        .map(|series| match chart {
            Chart::Temperature => format!(
                "{}={}",
                series.channel,
                series
                    .points
                    .last()
                    .map(|p| p.value.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
            ),
            _ => summarize_series(series),
        })
        .collect();

    if parts.is_empty() {
        return None;
    }

    let span = match (snapshot.time_axis.first(), snapshot.time_axis.last()) {
        (Some(first), Some(last)) => {
            format!(" [{} - {}]", format_time_label(first), format_time_label(last))
        }
        _ => String::new(),
    };
    Some(format!("{}{}: {}", chart.title(), span, parts.join(", ")))
}

/// `name n=<len> last=<v> min=<v> max=<v>`, skipping gap markers
pub fn summarize_series(series: &ChannelSeries) -> String {
    let values: Vec<f64> = series
        .values()
        .into_iter()
        .filter(|v| !v.is_nan())
        .collect();
    if values.is_empty() {
        return format!("{} n={}", series.channel, series.points.len());
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let last = values[values.len() - 1];
    format!(
        "{} n={} last={:.3} min={:.3} max={:.3}",
        series.channel,
        series.points.len(),
        last,
        min,
        max
    )
}
