//! Alert sink that remembers what it was asked to show

use duewatch::{Alert, AlertSink};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts().into_iter().map(|a| a.title).collect()
    }
}

impl AlertSink for RecordingAlertSink {
    fn show(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}
