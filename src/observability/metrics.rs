use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub requests_created_total: IntCounter,
    pub requests_stored: IntGauge,
    pub status_transitions_total: IntCounterVec,
    pub acceptance_conflicts_total: IntCounter,
    pub otp_verifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_created_total =
            IntCounter::new("requests_created_total", "Total delivery requests created")
                .expect("valid requests_created_total metric");

        let requests_stored =
            IntGauge::new("requests_stored", "Current number of stored delivery requests")
                .expect("valid requests_stored metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new(
                "status_transitions_total",
                "Total status changes by target status",
            ),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let acceptance_conflicts_total = IntCounter::new(
            "acceptance_conflicts_total",
            "Accept calls rejected because the request was not pending",
        )
        .expect("valid acceptance_conflicts_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new("otp_verifications_total", "OTP verification attempts by outcome"),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        registry
            .register(Box::new(requests_created_total.clone()))
            .expect("register requests_created_total");
        registry
            .register(Box::new(requests_stored.clone()))
            .expect("register requests_stored");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(acceptance_conflicts_total.clone()))
            .expect("register acceptance_conflicts_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");

        Self {
            registry,
            requests_created_total,
            requests_stored,
            status_transitions_total,
            acceptance_conflicts_total,
            otp_verifications_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
