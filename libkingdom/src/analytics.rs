//! Fire-and-forget analytics events

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Mutex;
use tracing::info;

/// A tracked event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub value: Option<f64>,
    pub properties: Map<String, Value>,
}

pub trait Analytics: Send + Sync {
    fn track_event(&self, name: &str, value: Option<f64>, properties: Map<String, Value>);
}

/// Emits events as structured log lines under the `analytics` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl Analytics for TracingAnalytics {
    fn track_event(&self, name: &str, value: Option<f64>, properties: Map<String, Value>) {
        let properties = Value::Object(properties);
        info!(target: "analytics", event = name, value = ?value, %properties, "tracked");
    }
}

/// Keeps every event in memory; useful for tests and debugging
#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl MemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_named(&self, name: &str) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

impl Analytics for MemoryAnalytics {
    fn track_event(&self, name: &str, value: Option<f64>, properties: Map<String, Value>) {
        self.events.lock().unwrap().push(AnalyticsEvent {
            name: name.to_string(),
            value,
            properties,
        });
    }
}
