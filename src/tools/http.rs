use super::{required_str, Tool, ToolOutcome};
use anyhow::{anyhow, bail, Result};
use serde_json::json;
use std::time::Duration;

const MAX_BODY_PREVIEW_CHARS: usize = 2_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain HTTP fetch tool. Reuses the process-wide HTTP client through a
/// blocking bridge, since tools execute synchronously on blocking threads.
pub struct HttpRequestTool;

impl HttpRequestTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Returns the status code and a body preview."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Full URL including http:// or https://" },
                "method": { "type": "string", "description": "HTTP method, defaults to GET" },
                "headers": { "type": "object", "description": "Request headers" },
                "body": { "description": "JSON body for the request" }
            },
            "required": ["url"]
        })
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        let request = match build_request_plan(params) {
            Ok(request) => request,
            Err(error) => return ToolOutcome::failure(self.name(), error),
        };

        match run_blocking_request(request) {
            Ok(rendered) => ToolOutcome::success(self.name(), rendered),
            Err(error) => ToolOutcome::failure(self.name(), error),
        }
    }
}

struct RequestPlan {
    method: reqwest::Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

fn build_request_plan(params: &serde_json::Value) -> Result<RequestPlan> {
    let url = required_str(params, "http_request", "url", &["url"])?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        bail!("url must include the protocol, http:// or https://");
    }

    let method_name = params
        .get("method")
        .and_then(|value| value.as_str())
        .unwrap_or("GET")
        .to_ascii_uppercase();
    let method = match method_name.as_str() {
        "GET" => reqwest::Method::GET,
        "POST" => reqwest::Method::POST,
        "PUT" => reqwest::Method::PUT,
        "DELETE" => reqwest::Method::DELETE,
        "PATCH" => reqwest::Method::PATCH,
        other => bail!("unsupported HTTP method: {other}"),
    };

    let mut headers = Vec::new();
    if let Some(map) = params.get("headers").and_then(|value| value.as_object()) {
        for (key, value) in map {
            if let Some(value) = value.as_str() {
                headers.push((key.clone(), value.to_string()));
            }
        }
    }

    Ok(RequestPlan {
        method,
        url: url.to_string(),
        headers,
        body: params.get("body").cloned().filter(|body| !body.is_null()),
    })
}

fn run_blocking_request(plan: RequestPlan) -> Result<String> {
    let fut = async move {
        let mut request = crate::engine::client::shared_http_client()
            .request(plan.method, &plan.url)
            .timeout(REQUEST_TIMEOUT);
        for (key, value) in &plan.headers {
            request = request.header(key, value);
        }
        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|error| anyhow!("HTTP request failed: {error}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| anyhow!("failed to read response body: {error}"))?;

        let mut rendered = format!("Status: {status}\n");
        if body.chars().count() > MAX_BODY_PREVIEW_CHARS {
            rendered.push_str(&body.chars().take(MAX_BODY_PREVIEW_CHARS).collect::<String>());
            rendered.push_str("\n... (truncated)");
        } else {
            rendered.push_str(&body);
        }
        Ok(rendered)
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(fut),
        Err(_) => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(fut),
    }
}
