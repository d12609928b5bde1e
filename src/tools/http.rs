//! `http.get`: a single outbound GET request via `ureq`. A0's closed
//! capability set exposes only GET, no `http.post`/etc., so there is no
//! method dispatch to do here.

use super::schema::{field, FieldKind, Schema};
use super::Tool;
use crate::capability::CapabilityMode;
use crate::policy::CancellationToken;
use crate::value::{Record, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpGetTool;

impl Tool for HttpGetTool {
    fn name(&self) -> &'static str {
        "http.get"
    }
    fn mode(&self) -> CapabilityMode {
        CapabilityMode::Read
    }
    fn capability_id(&self) -> &'static str {
        "http.get"
    }
    fn input_schema(&self) -> Schema {
        Schema(&[field("url", FieldKind::String, true), field("headers", FieldKind::Record, false)])
    }
    fn execute(&self, args: &Record, cancel: &CancellationToken) -> Result<Value, String> {
        let url = match args.get("url") {
            Some(Value::String(s)) => s.as_str(),
            _ => return Err("missing or non-string 'url' field".to_string()),
        };

        let timeout = cancel.remaining().unwrap_or(DEFAULT_TIMEOUT);
        let mut request = ureq::get(url).timeout(timeout);

        if let Some(Value::Record(headers)) = args.get("headers") {
            for (key, value) in headers.iter() {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                request = request.set(key, &value);
            }
        }

        let response = request.call().map_err(|e| format!("GET {} failed: {}", url, e))?;
        let status = response.status();

        let mut headers_out = Record::new();
        for name in response.headers_names() {
            let value = response.header(&name).unwrap_or("").to_string();
            headers_out.insert(name, Value::String(value));
        }

        let body = response.into_string().map_err(|e| format!("failed to read response body: {}", e))?;

        let mut result = Record::new();
        result.insert("status", Value::Number(status as f64));
        result.insert("headers", Value::Record(headers_out));
        result.insert("body", Value::String(body));
        Ok(Value::Record(result))
    }
}
