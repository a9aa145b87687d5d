use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use warden_core::WardenError;

#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub deposits_submitted: u64,
    pub pauses_submitted: u64,
    pub unvets_submitted: u64,
    pub cycles_failed: u64,
}

pub struct Metrics {
    registry: Registry,
    actions_total: IntCounterVec,
    messages_total: IntCounterVec,
    cycle_outcomes_total: IntCounterVec,
    live_guardians: IntGauge,
    started_at: Instant,
    deposits_submitted: AtomicU64,
    pauses_submitted: AtomicU64,
    unvets_submitted: AtomicU64,
    cycles_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Result<Self, WardenError> {
        debug!("initializing prometheus metrics");
        let registry = Registry::new();
        let actions_total = IntCounterVec::new(
            prometheus::Opts::new("actions_total", "Submitted protocol actions by kind"),
            &["kind"],
        )
        .map_err(|err| WardenError::Message(err.to_string()))?;
        let messages_total = IntCounterVec::new(
            prometheus::Opts::new("messages_total", "Guardian messages held by kind"),
            &["kind"],
        )
        .map_err(|err| WardenError::Message(err.to_string()))?;
        let cycle_outcomes_total = IntCounterVec::new(
            prometheus::Opts::new("cycle_outcomes_total", "Bot cycles by outcome"),
            &["bot", "outcome"],
        )
        .map_err(|err| WardenError::Message(err.to_string()))?;
        let live_guardians =
            IntGauge::new("live_guardians", "Distinct guardians seen alive recently")
                .map_err(|err| WardenError::Message(err.to_string()))?;

        registry
            .register(Box::new(actions_total.clone()))
            .map_err(|err| WardenError::Message(err.to_string()))?;
        registry
            .register(Box::new(messages_total.clone()))
            .map_err(|err| WardenError::Message(err.to_string()))?;
        registry
            .register(Box::new(cycle_outcomes_total.clone()))
            .map_err(|err| WardenError::Message(err.to_string()))?;
        registry
            .register(Box::new(live_guardians.clone()))
            .map_err(|err| WardenError::Message(err.to_string()))?;

        let out = Self {
            registry,
            actions_total,
            messages_total,
            cycle_outcomes_total,
            live_guardians,
            started_at: Instant::now(),
            deposits_submitted: AtomicU64::new(0),
            pauses_submitted: AtomicU64::new(0),
            unvets_submitted: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
        };
        debug!("prometheus metrics registered metric_count=4");
        Ok(out)
    }

    pub fn inc_action(&self, kind: &str) {
        self.actions_total.with_label_values(&[kind]).inc();
        match kind {
            "deposit" => {
                self.deposits_submitted.fetch_add(1, Ordering::Relaxed);
            }
            "pause" => {
                self.pauses_submitted.fetch_add(1, Ordering::Relaxed);
            }
            "unvet" => {
                self.unvets_submitted.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    pub fn observe_messages(&self, kind: &str, count: usize) {
        self.messages_total.with_label_values(&[kind]).inc_by(count as u64);
    }

    pub fn inc_cycle(&self, bot: &str, outcome: &str) {
        self.cycle_outcomes_total.with_label_values(&[bot, outcome]).inc();
        if outcome == "failed" {
            self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_live_guardians(&self, count: usize) {
        self.live_guardians.set(count as i64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime: self.started_at.elapsed(),
            deposits_submitted: self.deposits_submitted.load(Ordering::Relaxed),
            pauses_submitted: self.pauses_submitted.load(Ordering::Relaxed),
            unvets_submitted: self.unvets_submitted.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
        }
    }

    pub fn encode(&self) -> Result<String, WardenError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| WardenError::Message(err.to_string()))?;
        String::from_utf8(buffer).map_err(|err| WardenError::Message(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_tracks_actions() {
        let metrics = Metrics::new().unwrap();
        metrics.inc_action("deposit");
        metrics.inc_action("deposit");
        metrics.inc_action("pause");
        metrics.inc_cycle("depositor", "failed");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deposits_submitted, 2);
        assert_eq!(snapshot.pauses_submitted, 1);
        assert_eq!(snapshot.unvets_submitted, 0);
        assert_eq!(snapshot.cycles_failed, 1);
    }

    #[test]
    fn encode_produces_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.inc_action("deposit");
        metrics.set_live_guardians(5);
        let text = metrics.encode().unwrap();
        assert!(text.contains("actions_total"));
        assert!(text.contains("live_guardians"));
    }
}
