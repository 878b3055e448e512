// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! aria2 JSON-RPC client.
//!
//! Speaks JSON-RPC 2.0 over HTTP POST. When an RPC secret is configured it is
//! sent as the first positional parameter (`"token:<secret>"`), as aria2
//! expects with `--rpc-secret`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::{AddOptions, Task, TaskFile, TaskStatus};
use super::QueueClient;
use crate::error::{FetchError, FetchResult};

/// Timeout for establishing the control connection (in seconds).
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Timeout for a single control call (in seconds).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size for waiting/stopped listings.
const LIST_PAGE: u64 = 1000;

/// Fields requested from `tellStatus` and the listing calls.
const STATUS_KEYS: &[&str] = &[
    "gid",
    "status",
    "totalLength",
    "completedLength",
    "downloadSpeed",
    "errorMessage",
    "files",
];

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    gid: String,
    status: String,
    #[serde(default)]
    total_length: String,
    #[serde(default)]
    completed_length: String,
    #[serde(default)]
    download_speed: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    files: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    path: String,
}

fn parse_counter(value: &str) -> u64 {
    value.parse().unwrap_or(0)
}

impl From<RawTask> for Task {
    fn from(raw: RawTask) -> Self {
        Task {
            gid: raw.gid,
            status: TaskStatus::from_keyword(&raw.status),
            total_length: parse_counter(&raw.total_length),
            completed_length: parse_counter(&raw.completed_length),
            download_speed: parse_counter(&raw.download_speed),
            error_message: raw.error_message.filter(|m| !m.is_empty()),
            files: raw.files.into_iter().map(|f| TaskFile::new(f.path)).collect(),
        }
    }
}

/// Client for an aria2 daemon's RPC interface.
#[derive(Debug)]
pub struct Aria2Client {
    endpoint: String,
    secret: Option<String>,
    client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

impl Aria2Client {
    /// Create a client for `url`.
    ///
    /// `/jsonrpc` is appended when the URL has no path, so both
    /// `http://host:6800` and `http://host:6800/jsonrpc` work.
    pub fn new(url: &str, secret: Option<String>) -> FetchResult<Self> {
        let endpoint = Self::endpoint_for(url)?;
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::QueueUnavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            secret: secret.filter(|s| !s.is_empty()),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn endpoint_for(url: &str) -> FetchResult<String> {
        let mut parsed = Url::parse(url)
            .map_err(|e| FetchError::Config(format!("invalid queue URL '{}': {}", url, e)))?;
        if parsed.path().is_empty() || parsed.path() == "/" {
            parsed.set_path("/jsonrpc");
        }
        Ok(parsed.to_string())
    }

    fn request_body(&self, method: &str, params: Vec<Value>) -> Value {
        let mut full = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.secret {
            full.push(json!(format!("token:{}", secret)));
        }
        full.extend(params);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({
            "jsonrpc": "2.0",
            "id": id.to_string(),
            "method": method,
            "params": full,
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> FetchResult<T> {
        let body = self.request_body(method, params);
        tracing::trace!("aria2 call {}", method);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    FetchError::QueueUnavailable(format!(
                        "cannot connect to aria2 at {}",
                        self.endpoint
                    ))
                } else if e.is_timeout() {
                    FetchError::QueueUnavailable(format!("{} timed out", method))
                } else {
                    FetchError::QueueUnavailable(format!("{}: {}", method, e))
                }
            })?;

        // aria2 answers RPC errors with a non-2xx status and a JSON body, so
        // the body is decoded regardless of status.
        let status = response.status();
        let envelope: RpcEnvelope<T> = response.json().map_err(|e| {
            FetchError::QueueUnavailable(format!(
                "{}: unreadable response (HTTP {}): {}",
                method, status, e
            ))
        })?;

        decode_envelope(method, envelope)
    }

    fn tell_status(&self, gid: &str) -> FetchResult<Task> {
        let raw: RawTask = self.call("aria2.tellStatus", vec![json!(gid), json!(STATUS_KEYS)])?;
        Ok(raw.into())
    }
}

fn decode_envelope<T>(method: &str, envelope: RpcEnvelope<T>) -> FetchResult<T> {
    if let Some(err) = envelope.error {
        return Err(FetchError::QueueUnavailable(format!(
            "{} failed: {} (code {})",
            method, err.message, err.code
        )));
    }
    envelope
        .result
        .ok_or_else(|| FetchError::QueueUnavailable(format!("{}: response without result", method)))
}

impl QueueClient for Aria2Client {
    fn list_tasks(&self) -> FetchResult<Vec<Task>> {
        let mut raw: Vec<RawTask> = self.call("aria2.tellActive", vec![json!(STATUS_KEYS)])?;
        raw.extend(self.call::<Vec<RawTask>>(
            "aria2.tellWaiting",
            vec![json!(0), json!(LIST_PAGE), json!(STATUS_KEYS)],
        )?);
        raw.extend(self.call::<Vec<RawTask>>(
            "aria2.tellStopped",
            vec![json!(0), json!(LIST_PAGE), json!(STATUS_KEYS)],
        )?);
        Ok(raw.into_iter().map(Task::from).collect())
    }

    fn add_task(&self, url: &str, options: &AddOptions) -> FetchResult<Task> {
        let options = serde_json::to_value(options)
            .map_err(|e| FetchError::QueueUnavailable(format!("cannot encode options: {}", e)))?;
        let gid: String = self.call("aria2.addUri", vec![json!([url]), options])?;
        self.tell_status(&gid)
    }

    fn refresh(&self, task: &mut Task) -> FetchResult<()> {
        *task = self.tell_status(&task.gid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_jsonrpc() {
        let client = Aria2Client::new("http://nas:6800", None).unwrap();
        assert_eq!(client.endpoint(), "http://nas:6800/jsonrpc");

        let client = Aria2Client::new("http://nas:6800/custom/rpc", None).unwrap();
        assert_eq!(client.endpoint(), "http://nas:6800/custom/rpc");
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(matches!(
            Aria2Client::new("not a url", None),
            Err(FetchError::Config(_))
        ));
    }

    #[test]
    fn test_request_body_prepends_secret() {
        let client = Aria2Client::new("http://nas:6800", Some("s3cret".into())).unwrap();
        let body = client.request_body("aria2.tellStatus", vec![json!("2089b05ecca3d829")]);
        assert_eq!(body["method"], "aria2.tellStatus");
        assert_eq!(body["params"], json!(["token:s3cret", "2089b05ecca3d829"]));

        let client = Aria2Client::new("http://nas:6800", Some(String::new())).unwrap();
        let body = client.request_body("aria2.tellActive", vec![]);
        assert_eq!(body["params"], json!([]));
    }

    #[test]
    fn test_request_ids_increase() {
        let client = Aria2Client::new("http://nas:6800", None).unwrap();
        let a = client.request_body("m", vec![]);
        let b = client.request_body("m", vec![]);
        assert_ne!(a["id"], b["id"]);
    }

    #[test]
    fn test_raw_task_conversion() {
        let raw: RawTask = serde_json::from_value(json!({
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "1000",
            "completedLength": "250",
            "downloadSpeed": "125",
            "files": [
                {"path": "[METADATA]/remote/checkpoints/a.bin", "index": "1"},
                {"path": "/remote/checkpoints/a.bin", "index": "2"}
            ]
        }))
        .unwrap();

        let task = Task::from(raw);
        assert!(task.is_active());
        assert_eq!(task.total_length, 1000);
        assert_eq!(task.completed_length, 250);
        assert_eq!(task.download_speed, 125);
        assert!(task.files[0].is_metadata);
        assert!(task.writes_to("/remote/checkpoints/a.bin"));
        assert_eq!(task.error_message, None);
    }

    #[test]
    fn test_raw_task_error_message() {
        let raw: RawTask = serde_json::from_value(json!({
            "gid": "1",
            "status": "error",
            "errorMessage": "Authorization failed",
        }))
        .unwrap();
        let task = Task::from(raw);
        assert_eq!(task.status, TaskStatus::Error);
        assert_eq!(task.total_length, 0);
        assert_eq!(task.error_message.as_deref(), Some("Authorization failed"));
    }

    #[test]
    fn test_decode_envelope_error() {
        let envelope: RpcEnvelope<String> = serde_json::from_value(json!({
            "id": "1",
            "jsonrpc": "2.0",
            "error": {"code": 1, "message": "Unauthorized"}
        }))
        .unwrap();
        let err = decode_envelope("aria2.addUri", envelope).unwrap_err();
        assert!(matches!(err, FetchError::QueueUnavailable(ref m) if m.contains("Unauthorized")));
    }

    #[test]
    fn test_decode_envelope_result() {
        let envelope: RpcEnvelope<String> = serde_json::from_value(json!({
            "id": "1",
            "jsonrpc": "2.0",
            "result": "2089b05ecca3d829"
        }))
        .unwrap();
        assert_eq!(decode_envelope("aria2.addUri", envelope).unwrap(), "2089b05ecca3d829");
    }

    // =========================================================================
    // Wire tests against a mock daemon
    // =========================================================================

    use httpmock::prelude::*;

    fn rpc_result(result: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": "1", "result": result })
    }

    fn method(name: &str) -> String {
        format!(r#""method":"{}""#, name)
    }

    fn raw_task(gid: &str, status: &str, path: &str) -> Value {
        json!({
            "gid": gid,
            "status": status,
            "totalLength": "100",
            "completedLength": "40",
            "downloadSpeed": "10",
            "files": [{ "path": path, "index": "1" }]
        })
    }

    #[test]
    fn test_list_tasks_unions_all_three_listings() {
        let server = MockServer::start();
        let active = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.tellActive"))
                .body_contains(r#""token:s3cret""#);
            then.status(200)
                .json_body(rpc_result(json!([raw_task("a1", "active", "/r/a.bin")])));
        });
        let waiting = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.tellWaiting"))
                .body_contains(r#""token:s3cret""#);
            then.status(200)
                .json_body(rpc_result(json!([raw_task("w1", "waiting", "/r/w.bin")])));
        });
        let stopped = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.tellStopped"))
                .body_contains(r#""token:s3cret""#);
            then.status(200).json_body(rpc_result(json!([
                raw_task("s1", "complete", "/r/s.bin"),
                raw_task("s2", "error", "/r/e.bin")
            ])));
        });

        let client = Aria2Client::new(&server.base_url(), Some("s3cret".into())).unwrap();
        let tasks = client.list_tasks().unwrap();

        active.assert();
        waiting.assert();
        stopped.assert();
        let gids: Vec<&str> = tasks.iter().map(|t| t.gid.as_str()).collect();
        assert_eq!(gids, vec!["a1", "w1", "s1", "s2"]);
        assert_eq!(tasks[1].status, TaskStatus::Waiting);
        assert_eq!(tasks[3].status, TaskStatus::Error);
    }

    #[test]
    fn test_add_task_reads_back_status() {
        let server = MockServer::start();
        let add = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.addUri"))
                .body_contains(r#"["https://example.com/a.bin"]"#)
                .body_contains(r#""dir":"/remote/checkpoints""#)
                .body_contains(r#""out":"a.bin""#)
                .body_contains(r#""header":["Authorization: Bearer t"]"#);
            then.status(200).json_body(rpc_result(json!("2089b05ecca3d829")));
        });
        let status = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.tellStatus"))
                .body_contains(r#""2089b05ecca3d829""#);
            then.status(200).json_body(rpc_result(raw_task(
                "2089b05ecca3d829",
                "waiting",
                "/remote/checkpoints/a.bin",
            )));
        });

        let client = Aria2Client::new(&server.base_url(), None).unwrap();
        let options = AddOptions::new("/remote/checkpoints", "a.bin")
            .with_headers(vec!["Authorization: Bearer t".into()]);
        let task = client.add_task("https://example.com/a.bin", &options).unwrap();

        add.assert();
        status.assert();
        assert_eq!(task.gid, "2089b05ecca3d829");
        assert!(task.is_pending());
        assert!(task.writes_to("/remote/checkpoints/a.bin"));
    }

    #[test]
    fn test_refresh_overwrites_task() {
        let server = MockServer::start();
        let status = server.mock(|when, then| {
            when.method(POST)
                .path("/jsonrpc")
                .body_contains(method("aria2.tellStatus"))
                .body_contains(r#""g1""#);
            then.status(200).json_body(rpc_result(json!({
                "gid": "g1",
                "status": "complete",
                "totalLength": "500",
                "completedLength": "500",
                "downloadSpeed": "0",
                "files": [{ "path": "/r/a.bin", "index": "1" }]
            })));
        });

        let client = Aria2Client::new(&server.base_url(), None).unwrap();
        let raw: RawTask = serde_json::from_value(raw_task("g1", "active", "/r/a.bin")).unwrap();
        let mut task = Task::from(raw);
        client.refresh(&mut task).unwrap();

        status.assert();
        assert!(task.is_complete());
        assert_eq!(task.total_length, 500);
        assert_eq!(task.completed_length, 500);
    }

    #[test]
    fn test_rpc_error_body_on_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/jsonrpc");
            then.status(400).json_body(json!({
                "jsonrpc": "2.0",
                "id": "1",
                "error": { "code": 1, "message": "Unauthorized" }
            }));
        });

        let client = Aria2Client::new(&server.base_url(), Some("wrong".into())).unwrap();
        let err = client.list_tasks().unwrap_err();
        assert!(matches!(err, FetchError::QueueUnavailable(ref m) if m.contains("Unauthorized")));
    }

    #[test]
    fn test_refused_connection_is_queue_unavailable() {
        let client = Aria2Client::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(client.list_tasks(), Err(FetchError::QueueUnavailable(_))));
    }

    #[test]
    #[ignore]
    fn test_live_daemon_listing() {
        // Requires: aria2c --enable-rpc --rpc-listen-port=6800
        let client = Aria2Client::new("http://localhost:6800", None).unwrap();
        client.list_tasks().unwrap();
    }
}
