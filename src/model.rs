use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Lifecycle state of a captured network call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Request sent, no response yet
    Pending,
    /// Response received
    Completed,
    /// Request errored out
    Failed,
}

/// Request metadata captured when a network call starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Response metadata delivered when a network call finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    pub end_time: DateTime<Utc>,
}

/// Full captured record for one request/response pair
///
/// The identifier is assigned by the capture mechanism and stays stable
/// from request-start through response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub request: RequestInfo,
    #[serde(default)]
    pub response: Option<ResponseData>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub state: LifecycleState,
}

impl LogEntry {
    /// Create a pending entry from request metadata
    pub fn started(id: impl Into<String>, request: RequestInfo) -> Self {
        Self {
            id: id.into(),
            request,
            response: None,
            start_time: Utc::now(),
            end_time: None,
            state: LifecycleState::Pending,
        }
    }

    /// Merge a response into this entry, finalizing its state
    pub fn apply_response(&mut self, response: ResponseData) {
        self.end_time = Some(response.end_time);
        self.state = if response.error.is_some() {
            LifecycleState::Failed
        } else {
            LifecycleState::Completed
        };
        self.response = Some(response);
    }

    /// Elapsed time between request start and response, formatted for
    /// display ("245 ms", "1.8 s"). None while the call is pending.
    pub fn duration_string(&self) -> Option<String> {
        let end = self.end_time?;
        let millis = (end - self.start_time).num_milliseconds().max(0);
        if millis < 1000 {
            Some(format!("{} ms", millis))
        } else {
            Some(format!("{:.1} s", millis as f64 / 1000.0))
        }
    }
}

/// Condensed, presentation-facing projection of a [`LogEntry`]
///
/// Summaries are derived whenever an entry changes; they never exist
/// without a backing entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSummary {
    pub id: String,
    pub title: String,
    pub method: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub duration: Option<String>,
    pub state: LifecycleState,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl LogSummary {
    /// Build a summary from a full entry
    pub fn from_entry(entry: &LogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            title: display_title(&entry.request.url),
            method: entry.request.method.clone(),
            start_time: entry.start_time,
            duration: entry.duration_string(),
            state: entry.state,
            status_code: entry.response.as_ref().and_then(|r| r.status_code),
        }
    }

    /// Fold a response into an existing summary, leaving identity fields
    /// (id, title, method, start time) untouched
    pub fn apply_response(&mut self, response: &ResponseData) {
        self.status_code = response.status_code;
        self.state = if response.error.is_some() {
            LifecycleState::Failed
        } else {
            LifecycleState::Completed
        };
        let millis = (response.end_time - self.start_time).num_milliseconds().max(0);
        self.duration = Some(if millis < 1000 {
            format!("{} ms", millis)
        } else {
            format!("{:.1} s", millis as f64 / 1000.0)
        });
    }
}

/// Derive a `scheme://host/path` title from a URL string, dropping query
/// and fragment. Falls back to the raw string when parsing fails.
fn display_title(raw_url: &str) -> String {
    match Url::parse(raw_url) {
        Ok(url) => match url.host_str() {
            Some(host) => format!("{}://{}{}", url.scheme(), host, url.path()),
            None => raw_url.to_string(),
        },
        Err(_) => raw_url.to_string(),
    }
}
