use log::debug;

use crate::schema::{Anomaly, TimeSeriesPoint};
use crate::utils::round2;

pub const MIN_ANOMALY_POINTS: usize = 5;
pub const ANOMALY_Z_THRESHOLD: f64 = 2.5;

/// Flags days whose revenue sits at least 2.5 population standard
/// deviations from the series mean.
///
/// Series shorter than five points are never flagged. A flat series has a
/// zero deviation, which is replaced by 1 so every z-score is 0.
pub fn detect_anomalies(series: &[TimeSeriesPoint]) -> Vec<Anomaly> {
    if series.len() < MIN_ANOMALY_POINTS {
        return Vec::new();
    }

    let n = series.len() as f64;
    let mean = series.iter().map(|p| p.revenue).sum::<f64>() / n;
    let variance = series
        .iter()
        .map(|p| (p.revenue - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = match variance.sqrt() {
        s if s == 0.0 => 1.0,
        s => s,
    };

    let anomalies: Vec<Anomaly> = series
        .iter()
        .filter_map(|point| {
            let z = (point.revenue - mean) / std;
            (z.abs() >= ANOMALY_Z_THRESHOLD).then(|| Anomaly {
                date: point.date,
                value: point.revenue,
                z_score: round2(z),
                message: format!(
                    "Revenue anomaly on {}: {:.2} (z={:.2})",
                    point.date.format("%Y-%m-%d"),
                    point.revenue,
                    z
                ),
            })
        })
        .collect();

    debug!(
        "Anomaly scan over {} points (mean={:.2}, std={:.2}) flagged {}",
        series.len(),
        mean,
        std,
        anomalies.len()
    );

    anomalies
}
