use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_alphabet_attempt(mode: &str, correct: bool) {
    metrics::counter!(
        "alphabet_attempts_total",
        "mode" => mode.to_string(),
        "correct" => correct.to_string()
    )
    .increment(1);
}

pub(crate) fn record_ocr_request(outcome: &'static str) {
    metrics::counter!("ocr_requests_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_content_served(stream: &'static str, rows: usize) {
    metrics::counter!("content_served_total", "stream" => stream).increment(rows as u64);
}
