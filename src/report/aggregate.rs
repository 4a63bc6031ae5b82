//! Per-host aggregation of stored samples.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collector::Host;
use crate::storage::LatencySample;

/// One chart point: unix seconds against milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: i64,
    pub y: f64,
}

/// Ordered latency points for one host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateSeries {
    pub host: Host,
    pub points: Vec<Point>,
}

impl CoordinateSeries {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Inclusive `(min, max)` of the x coordinates.
    pub fn x_bounds(&self) -> Option<(i64, i64)> {
        let min = self.points.iter().map(|p| p.x).min()?;
        let max = self.points.iter().map(|p| p.x).max()?;
        Some((min, max))
    }

    /// Largest y coordinate.
    pub fn y_max(&self) -> Option<f64> {
        self.points.iter().map(|p| p.y).reduce(f64::max)
    }
}

/// Group `records` by exact host string.
///
/// Within a host, points keep the order they appear in `records`. With
/// `sort_by_time` they are additionally stable-sorted by timestamp, which is a
/// no-op for a log written by a single writer.
pub fn aggregate(records: &[LatencySample], sort_by_time: bool) -> BTreeMap<Host, CoordinateSeries> {
    let mut series: BTreeMap<Host, CoordinateSeries> = BTreeMap::new();

    for record in records {
        series
            .entry(record.host.clone())
            .or_insert_with(|| CoordinateSeries::new(record.host.clone()))
            .points
            .push(Point {
                x: record.timestamp.timestamp(),
                y: record.mean_rtt_ms(),
            });
    }

    if sort_by_time {
        for s in series.values_mut() {
            s.points.sort_by_key(|p| p.x);
        }
    }
    series
}
