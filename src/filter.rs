use crate::model::RequestInfo;

/// Predicate over a captured request, consulted before a file-log line is
/// composed. Filters are evaluated in registration order and short-circuit
/// on the first acceptance; an empty filter set accepts everything.
pub trait RequestFilter: Send + Sync {
    fn should_log(&self, request: &RequestInfo) -> bool;
}

/// Accepts requests whose URL scheme matches (case-insensitive)
pub struct SchemeFilter {
    scheme: String,
}

impl SchemeFilter {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
        }
    }
}

impl RequestFilter for SchemeFilter {
    fn should_log(&self, request: &RequestInfo) -> bool {
        url::Url::parse(&request.url)
            .map(|u| u.scheme().eq_ignore_ascii_case(&self.scheme))
            .unwrap_or(false)
    }
}

/// Accepts requests to a specific host (case-insensitive)
pub struct HostFilter {
    host: String,
}

impl HostFilter {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
        }
    }
}

impl RequestFilter for HostFilter {
    fn should_log(&self, request: &RequestInfo) -> bool {
        url::Url::parse(&request.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(&self.host)))
            .unwrap_or(false)
    }
}

/// Accepts requests whose URL contains a substring
pub struct ContainsFilter {
    needle: String,
}

impl ContainsFilter {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

impl RequestFilter for ContainsFilter {
    fn should_log(&self, request: &RequestInfo) -> bool {
        request.url.contains(&self.needle)
    }
}
