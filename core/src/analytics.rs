use hdrhistogram::Histogram;
use log::warn;
use serde::{Deserialize, Serialize};

/// One hour, in microseconds.
const MAX_TRACKED_US: u64 = 3_600_000_000;

/// Request-to-last-byte response times of completed objects.
#[derive(Clone, Debug)]
pub struct ResponseTimes {
    histogram: Histogram<u64>,
}

impl Default for ResponseTimes {
    fn default() -> Self {
        Self {
            histogram: Histogram::new_with_bounds(1, MAX_TRACKED_US, 3)
                .expect("static histogram bounds are valid"),
        }
    }
}

impl ResponseTimes {
    pub fn record(&mut self, elapsed_us: u64) {
        self.histogram.saturating_record(elapsed_us.max(1));
    }

    pub fn merge(&mut self, other: &ResponseTimes) {
        if let Err(e) = self.histogram.add(&other.histogram) {
            warn!("dropping response times that do not fit: {e:?}");
        }
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn mean_ms(&self) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        self.histogram.mean() / 1000.0
    }

    pub fn percentile_ms(&self, p: f64) -> Option<f64> {
        if self.histogram.is_empty() {
            return None;
        }
        Some(self.histogram.value_at_quantile(p / 100.0) as f64 / 1000.0)
    }

    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count(),
            mean_ms: self.mean_ms(),
            p50_ms: self.percentile_ms(50.0).unwrap_or(0.0),
            p99_ms: self.percentile_ms(99.0).unwrap_or(0.0),
            max_ms: if self.histogram.is_empty() { 0.0 } else { self.histogram.max() as f64 / 1000.0 },
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

/// Delivery counters of one client application.
#[derive(Clone, Debug, Default)]
pub struct ClientStats {
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub pages_completed: u64,
    pub objects_requested: u64,
    pub objects_received: u64,
    /// Fragments discarded: malformed header or indices not matching the pending request.
    pub delivery_failures: u64,
    pub connections_opened: u64,
    pub bytes_requested: u64,
    pub bytes_received: u64,
    pub response_times: ResponseTimes,
}

/// One request the server answered, in completion order.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ServedRequest {
    pub client: u32,
    pub conn_seq: u32,
    pub page: u32,
    pub object: u32,
    pub response_size: u32,
}

#[derive(Clone, Debug, Default)]
pub struct ServerStats {
    pub connections_accepted: u64,
    pub requests_received: u64,
    pub malformed: u64,
    pub bytes_sent: u64,
    pub served: Vec<ServedRequest>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct TrafficSummary {
    pub sessions_completed: u64,
    pub pages_completed: u64,
    pub objects_received: u64,
    pub delivery_failures: u64,
    pub connections_opened: u64,
    pub bytes_requested: u64,
    pub bytes_received: u64,
    pub requests_served: u64,
    pub response_times: LatencySummary,
}

impl TrafficSummary {
    pub fn add_client(&mut self, stats: &ClientStats) {
        self.sessions_completed += stats.sessions_completed;
        self.pages_completed += stats.pages_completed;
        self.objects_received += stats.objects_received;
        self.delivery_failures += stats.delivery_failures;
        self.connections_opened += stats.connections_opened;
        self.bytes_requested += stats.bytes_requested;
        self.bytes_received += stats.bytes_received;
    }
}
