//! alerts.rs — Session alert log
//!
//! Most-recent-first, capped at 10 entries. Creating an alert resolves any
//! prior Active alert of the same type, so at most one alert per type is
//! Active at a time. Resolved is terminal. The log lives in memory only; the
//! backend's `alerts` collection is the durable feed.

use chrono::Local;
use fleet_types::{Alert, AlertStatus, AlertType};

/// Maximum number of entries kept in the session log.
pub const ALERT_LOG_CAP: usize = 10;

#[derive(Debug, Clone)]
pub struct AlertLog {
    entries: Vec<Alert>,
    next_id: u64,
}

impl AlertLog {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_id: 1 }
    }

    /// Log pre-populated with the morning-run history the dashboard shows on
    /// first load.
    pub fn with_seed_history() -> Self {
        let mut log = Self::new();
        let seed = [
            ("08:45 AM", AlertType::Geofence, "Bus entered Emma's geofence zone", AlertStatus::Resolved),
            ("08:42 AM", AlertType::Overspeed, "Speed exceeded 50 km/h in school zone", AlertStatus::Resolved),
            ("08:38 AM", AlertType::Normal, "Route started - Morning pickup", AlertStatus::Active),
            ("08:35 AM", AlertType::Geofence, "Bus entered Liam's geofence zone", AlertStatus::Resolved),
            ("Yesterday", AlertType::Emergency, "Emergency button pressed - False alarm", AlertStatus::Resolved),
        ];
        for (time, alert_type, message, status) in seed {
            let id = log.take_id();
            log.entries.push(Alert {
                id,
                time: time.to_string(),
                alert_type,
                message: message.to_string(),
                status,
            });
        }
        log
    }

    fn take_id(&mut self) -> String {
        let id = format!("alert-{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Record a new alert: resolve the prior Active alert of the same type,
    /// prepend, truncate to the cap. Returns the created record.
    pub fn record(&mut self, alert_type: AlertType, message: impl Into<String>) -> Alert {
        for entry in &mut self.entries {
            if entry.alert_type == alert_type && entry.status == AlertStatus::Active {
                entry.status = AlertStatus::Resolved;
            }
        }

        let alert = Alert {
            id: self.take_id(),
            time: Local::now().format("%I:%M %p").to_string(),
            alert_type,
            message: message.into(),
            status: AlertStatus::Active,
        };
        self.entries.insert(0, alert.clone());
        self.entries.truncate(ALERT_LOG_CAP);
        alert
    }

    /// Most-recent-first.
    pub fn entries(&self) -> &[Alert] {
        &self.entries
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}
