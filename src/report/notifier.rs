//! Webhook notification of run results

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::debug;
use url::Url;

use super::RunReport;
use crate::traits::HttpClient;

const PLACEHOLDER_MARKERS: &[&str] = &["placeholder", "your-webhook", "changeme"];

/// Parse a configured webhook URL, rejecting blanks and template leftovers
///
/// Returns `None` for anything that should not be contacted.
pub fn webhook_target(raw: Option<&str>) -> Option<Url> {
    let raw = raw?.trim();
    if raw.is_empty() || (raw.starts_with('<') && raw.ends_with('>')) {
        return None;
    }

    let lowered = raw.to_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
        return None;
    }

    Url::parse(raw)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent(u16),
    Skipped,
}

#[derive(Debug, Serialize)]
struct Payload {
    status: &'static str,
    environment: &'static str,
    message: String,
    metadata: serde_json::Value,
}

pub struct Notifier<'a> {
    http: &'a dyn HttpClient,
    target: Option<Url>,
}

impl<'a> Notifier<'a> {
    pub fn new(http: &'a dyn HttpClient, webhook_url: Option<&str>) -> Self {
        Self {
            http,
            target: webhook_target(webhook_url),
        }
    }

    /// Post one message describing `report`
    pub fn notify(&self, report: &RunReport, report_path: Option<&Path>) -> Result<Delivery> {
        let Some(url) = &self.target else {
            debug!("No webhook configured; skipping notification");
            return Ok(Delivery::Skipped);
        };

        let payload = Payload {
            status: report.status.as_str(),
            environment: report.environment.as_str(),
            message: report.headline(),
            metadata: json!({
                "operation": report.operation,
                "run_id": report.run_id,
                "triggered_by": report.triggered_by,
                "final_stage": report.final_stage,
                "summary": report.summary,
                "error": report.error,
                "report_path": report_path.map(|p| p.display().to_string()),
            }),
        };
        let body = serde_json::to_string(&payload).context("Failed to serialize notification")?;

        let status = self
            .http
            .post_json(url.as_str(), &body)
            .context("Failed to deliver notification")?;
        debug!("Notification delivered with status {}", status);
        Ok(Delivery::Sent(status))
    }
}
