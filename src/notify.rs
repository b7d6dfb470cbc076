//! Alert notifications and the sinks that deliver them.
//!
//! The pipeline composes one [`AlertNotification`] per alerting reading and
//! hands it to every configured [`NotificationSink`]. Delivery failures are
//! reported back as [`NotifyError`] and never stop the pipeline.

use crate::core::{AnalysisResult, PhysicalAlert, RiskLevel};
use crate::reading::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How urgently a notification should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Watch,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Watch => "watch",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload sent to notification sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: Uuid,
    pub device_id: String,
    /// Host that produced the alert
    pub reporter: String,
    pub created_at: DateTime<Utc>,
    pub risk: u8,
    pub risk_text: RiskLevel,
    pub alerts: Vec<String>,
    /// The reading that triggered the alert
    pub reading: Reading,
    /// Whether a fixed physical limit was broken
    pub physical: bool,
}

impl AlertNotification {
    /// Compose a notification from a personalised analysis.
    pub fn from_analysis(device_id: &str, reading: &Reading, result: &AnalysisResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            reporter: reporter_name(),
            created_at: Utc::now(),
            risk: result.risk,
            risk_text: result.risk_text,
            alerts: result.alerts.clone(),
            reading: reading.clone(),
            physical: false,
        }
    }

    /// Compose a notification from a physical-limit violation.
    pub fn from_physical(device_id: &str, reading: &Reading, alert: &PhysicalAlert) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            reporter: reporter_name(),
            created_at: Utc::now(),
            risk: alert.risk,
            risk_text: RiskLevel::from_score(alert.risk as u32),
            alerts: alert.messages(),
            reading: reading.clone(),
            physical: true,
        }
    }

    /// One-line subject suitable for an email or chat title.
    pub fn subject(&self) -> String {
        format!("Health alert for device {} ({}/100)", self.device_id, self.risk)
    }

    pub fn severity(&self) -> Severity {
        if self.risk >= 80 || self.physical {
            Severity::Critical
        } else if self.risk >= 50 {
            Severity::Warning
        } else {
            Severity::Watch
        }
    }
}

fn reporter_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Notification delivery errors.
#[derive(Debug)]
pub enum NotifyError {
    /// Sink is misconfigured
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Receiver returned an error response
    Server { status: u16, message: String },
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Config(msg) => write!(f, "Notifier config error: {msg}"),
            NotifyError::Network(msg) => write!(f, "Notifier network error: {msg}"),
            NotifyError::Server { status, message } => {
                write!(f, "Notifier server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for NotifyError {}

/// A destination for alert notifications.
pub trait NotificationSink: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError>;
}

/// Writes notifications as structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        tracing::warn!(
            id = %notification.id,
            device = %notification.device_id,
            risk = notification.risk,
            severity = %notification.severity(),
            physical = notification.physical,
            alerts = ?notification.alerts,
            "{}",
            notification.subject()
        );
        Ok(())
    }
}

/// Posts notifications as JSON to an HTTP endpoint.
///
/// Owns a current-thread runtime so it can be driven from the
/// synchronous pipeline thread.
#[cfg(feature = "webhook")]
pub struct WebhookNotifier {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "webhook")]
impl WebhookNotifier {
    pub fn new(config: &crate::config::WebhookConfig) -> Result<Self, NotifyError> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| NotifyError::Config("webhook url is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotifyError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            url,
            token: config.token.clone(),
            client,
            runtime,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(notification);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(feature = "webhook")]
impl NotificationSink for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn notify(&self, notification: &AlertNotification) -> Result<(), NotifyError> {
        self.runtime.block_on(self.post(notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::check_physical_limits;

    fn result(risk: u8) -> AnalysisResult {
        AnalysisResult {
            alerts: vec!["Low blood oxygen: SpO2 90%, risk of hypoxia".to_string()],
            risk,
            risk_text: RiskLevel::from_score(risk as u32),
            pattern: None,
            info: None,
        }
    }

    #[test]
    fn test_subject() {
        let n = AlertNotification::from_analysis("device1", &Reading::new(), &result(60));
        assert_eq!(n.subject(), "Health alert for device device1 (60/100)");
        assert!(!n.reporter.is_empty());
    }

    #[test]
    fn test_severity() {
        let reading = Reading::new();
        let severity =
            |risk| AlertNotification::from_analysis("d", &reading, &result(risk)).severity();
        assert_eq!(severity(40), Severity::Watch);
        assert_eq!(severity(50), Severity::Warning);
        assert_eq!(severity(80), Severity::Critical);
    }

    #[test]
    fn test_physical_notification_is_critical() {
        let reading = Reading::new().with_bpm(170.0);
        let alert = check_physical_limits(&reading).unwrap();
        let n = AlertNotification::from_physical("d", &reading, &alert);
        assert!(n.physical);
        assert_eq!(n.risk, 100);
        assert_eq!(n.risk_text, RiskLevel::Emergency);
        assert_eq!(n.severity(), Severity::Critical);
        assert_eq!(n.alerts.len(), 1);
    }

    #[test]
    fn test_notifications_get_unique_ids() {
        let a = AlertNotification::from_analysis("d", &Reading::new(), &result(60));
        let b = AlertNotification::from_analysis("d", &Reading::new(), &result(60));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_payload_json() {
        let reading = Reading::new().with_spo2(90.0);
        let n = AlertNotification::from_analysis("device1", &reading, &result(60));
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["device_id"], "device1");
        assert_eq!(json["risk_text"], "High risk");
        assert_eq!(json["reading"]["spO2"], 90.0);
        assert_eq!(json["physical"], false);
    }

    #[test]
    fn test_log_notifier() {
        let n = AlertNotification::from_analysis("d", &Reading::new(), &result(60));
        assert!(LogNotifier.notify(&n).is_ok());
        assert_eq!(LogNotifier.name(), "log");
    }

    #[cfg(feature = "webhook")]
    #[test]
    fn test_webhook_requires_url() {
        let config = crate::config::WebhookConfig::default();
        assert!(matches!(WebhookNotifier::new(&config), Err(NotifyError::Config(_))));
    }

    #[cfg(feature = "webhook")]
    #[test]
    fn test_webhook_unreachable_endpoint() {
        let config = crate::config::WebhookConfig {
            url: Some("http://127.0.0.1:9/hook".to_string()),
            token: Some("secret".to_string()),
            timeout_secs: Some(2),
        };
        let notifier = WebhookNotifier::new(&config).unwrap();
        let n = AlertNotification::from_analysis("d", &Reading::new(), &result(60));
        assert!(matches!(notifier.notify(&n), Err(NotifyError::Network(_))));
    }
}
