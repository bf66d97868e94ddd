//! Access log format module
//!
//! Supports the three common access log shapes:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (structured, one object per line)

use chrono::Local;

/// Access log entry, one per pipeline invocation
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Client IP address ("-" when the transport did not supply one)
    pub remote_addr: String,
    /// Request timestamp
    pub time: chrono::DateTime<Local>,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request URI path
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    /// HTTP version (1.0, 1.1, 2)
    pub http_version: String,
    /// Response status code
    pub status: u16,
    /// Response body size in bytes
    pub body_bytes: usize,
    /// Handler time in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// New entry stamped with the current time
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            request_time_us: 0,
        }
    }

    /// Format the entry according to the configured format name.
    /// Unknown names fall back to `combined`.
    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.format_common(),
            "json" => self.format_json(),
            _ => self.format_combined(),
        }
    }

    fn request_line(&self) -> String {
        format!(
            "{} {}{} HTTP/{}",
            self.method,
            self.path,
            self.query
                .as_ref()
                .map(|q| format!("?{q}"))
                .unwrap_or_default(),
            self.http_version,
        )
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes $request_time_us`
    fn format_combined(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {} {}us",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_line(),
            self.status,
            self.body_bytes,
            self.request_time_us,
        )
    }

    /// Common Log Format (CLF)
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.time.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    /// One JSON object per line. Built by hand; the fields are all
    /// numbers or strings under our control except path/query.
    fn format_json(&self) -> String {
        let query_json = self
            .query
            .as_ref()
            .map_or_else(|| "null".to_string(), |q| format!("\"{}\"", escape_json(q)));

        format!(
            r#"{{"remote_addr":"{}","time":"{}","method":"{}","path":"{}","query":{},"http_version":"{}","status":{},"body_bytes":{},"request_time_us":{}}}"#,
            escape_json(&self.remote_addr),
            self.time.format("%Y-%m-%dT%H:%M:%S%z"),
            escape_json(&self.method),
            escape_json(&self.path),
            query_json,
            self.http_version,
            self.status,
            self.body_bytes,
            self.request_time_us,
        )
    }
}

/// Escape a string for embedding in JSON output
fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AccessLogEntry {
        let mut e = AccessLogEntry::new(
            "203.0.113.7".to_string(),
            "GET".to_string(),
            "/bundles/app/logo.png".to_string(),
        );
        e.status = 404;
        e.body_bytes = 13;
        e.request_time_us = 250;
        e
    }

    #[test]
    fn test_combined_contains_request_line_and_status() {
        let line = entry().format("combined");
        assert!(line.contains("\"GET /bundles/app/logo.png HTTP/1.1\""));
        assert!(line.contains(" 404 13 "));
    }

    #[test]
    fn test_common_has_no_timing() {
        let line = entry().format("common");
        assert!(!line.contains("us"));
        assert!(line.ends_with("404 13"));
    }

    #[test]
    fn test_json_escapes_quotes() {
        let mut e = entry();
        e.path = "/weird\"path".to_string();
        let line = e.format("json");
        assert!(line.contains(r#"\"path"#));
        assert!(line.starts_with('{') && line.ends_with('}'));
    }

    #[test]
    fn test_unknown_format_falls_back_to_combined() {
        let e = entry();
        assert_eq!(e.format("nonsense"), e.format("combined"));
    }

    #[test]
    fn test_query_is_appended_to_request_line() {
        let mut e = entry();
        e.query = Some("page=2".to_string());
        assert!(e.format("common").contains("/bundles/app/logo.png?page=2"));
    }
}
