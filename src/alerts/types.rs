use serde::{Deserialize, Serialize};

/// A persisted detection event. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertRecord {
    /// Assigned by the store.
    #[serde(default)]
    pub id: Option<i64>,
    pub task_id: String,
    pub task_type: String,
    pub image_path: String,
    pub detection_count: u64,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    #[serde(default)]
    pub algorithm_id: String,
    #[serde(default)]
    pub algorithm_name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub inference_time_ms: u64,
    /// Raw backend result.
    #[serde(default)]
    pub result: serde_json::Value,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter and page for alert listing. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertQuery {
    pub task_id: Option<String>,
    pub task_type: Option<String>,
    pub min_detections: Option<u64>,
    pub max_detections: Option<u64>,
    /// Inclusive lower bound on `created_at`, epoch milliseconds.
    pub start_time: Option<u64>,
    /// Inclusive upper bound on `created_at`, epoch milliseconds.
    pub end_time: Option<u64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl AlertQuery {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        match self.page_size {
            Some(size) if size > 0 => size.min(MAX_PAGE_SIZE),
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.page_size() as u64
    }

    pub fn matches(&self, record: &AlertRecord) -> bool {
        self.task_id.as_ref().is_none_or(|t| &record.task_id == t)
            && self.task_type.as_ref().is_none_or(|t| &record.task_type == t)
            && self.min_detections.is_none_or(|m| record.detection_count >= m)
            && self.max_detections.is_none_or(|m| record.detection_count <= m)
            && self.start_time.is_none_or(|t| record.created_at >= t)
            && self.end_time.is_none_or(|t| record.created_at <= t)
    }
}

/// One page of alerts plus the total number matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPage {
    pub items: Vec<AlertRecord>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
