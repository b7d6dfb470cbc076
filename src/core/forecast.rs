//! Weighted-moving-average forecast of the next value of a channel.

use crate::core::stats::round1;
use crate::reading::{Channel, HistoryEntry};

/// Predict the next value of `channel` from the last `window` present values.
///
/// The most recent value carries weight `k`, the oldest weight 1. Returns
/// `None` when there is nothing to average.
pub fn predict_next(history: &[HistoryEntry], channel: Channel, window: usize) -> Option<f64> {
    let values: Vec<f64> = history.iter().filter_map(|e| e.channel(channel)).collect();
    let recent = &values[values.len().saturating_sub(window)..];

    let (weighted, total_weight) = recent
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weights), (i, value)| {
            let weight = (i + 1) as f64;
            (sum + value * weight, weights + weight)
        });

    if total_weight == 0.0 {
        return None;
    }
    Some(round1(weighted / total_weight))
}
