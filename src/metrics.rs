//! Prometheus counters for relay traffic.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Per-route counters, exposed at `GET /metrics`.
pub struct RelayMetrics {
    registry: Registry,
    requests: IntCounterVec,
    fragments: IntCounterVec,
    stream_errors: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("relay_requests_total", "Relay requests accepted"),
            &["route"],
        )?;
        let fragments = IntCounterVec::new(
            Opts::new("relay_fragments_total", "Non-empty fragments forwarded"),
            &["route"],
        )?;
        let stream_errors = IntCounterVec::new(
            Opts::new(
                "relay_stream_errors_total",
                "Streams terminated by an error sentinel",
            ),
            &["route"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(fragments.clone()))?;
        registry.register(Box::new(stream_errors.clone()))?;

        Ok(Self {
            registry,
            requests,
            fragments,
            stream_errors,
        })
    }

    pub fn request(&self, route: &str) {
        self.requests.with_label_values(&[route]).inc();
    }

    pub fn fragment(&self, route: &str) {
        self.fragments.with_label_values(&[route]).inc();
    }

    pub fn stream_error(&self, route: &str) {
        self.stream_errors.with_label_values(&[route]).inc();
    }

    pub fn requests_for(&self, route: &str) -> u64 {
        self.requests.with_label_values(&[route]).get()
    }

    pub fn fragments_for(&self, route: &str) -> u64 {
        self.fragments.with_label_values(&[route]).get()
    }

    pub fn stream_errors_for(&self, route: &str) -> u64 {
        self.stream_errors.with_label_values(&[route]).get()
    }

    /// Render all counters in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_with_route_label() {
        let metrics = RelayMetrics::new().unwrap();
        metrics.request("chat");
        metrics.fragment("chat");
        metrics.fragment("chat");
        metrics.stream_error("vision");

        assert_eq!(metrics.requests_for("chat"), 1);
        assert_eq!(metrics.fragments_for("chat"), 2);
        assert_eq!(metrics.stream_errors_for("vision"), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("relay_fragments_total{route=\"chat\"} 2"));
        assert!(text.contains("relay_stream_errors_total{route=\"vision\"} 1"));
    }
}
