//! In-process mock of the Sumo Logic collector API

#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumo_source::sumologic::{Collector, Credentials, SumoApi};

pub const USERNAME: &str = "suTEST";
pub const PASSWORD: &str = "test-access-key";
pub const COLLECTOR_ID: u64 = 42;
pub const COLLECTOR_NAME: &str = "web-01";

/// A request as seen by the mock server
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub if_match: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    pub fn is_write(&self) -> bool {
        matches!(self.method.as_str(), "POST" | "PUT" | "DELETE")
    }
}

#[derive(Debug)]
pub struct MockState {
    pub collectors: Vec<Value>,
    pub sources: Vec<Value>,
    /// Etag version per source id
    pub versions: HashMap<u64, u64>,
    pub next_id: u64,
    pub requests: Vec<RecordedRequest>,
    /// Every request fails with this status
    pub fail_with: Option<u16>,
    /// The next N requests fail with 500
    pub fail_next: usize,
    /// Every update is rejected as stale
    pub reject_updates: bool,
    /// The source listing returns a non-JSON body
    pub malformed_sources: bool,
    /// Single-source reads omit the ETag header
    pub omit_etag: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            collectors: vec![json!({
                "id": COLLECTOR_ID,
                "name": COLLECTOR_NAME,
                "collectorType": "Installable",
                "alive": true
            })],
            sources: Vec::new(),
            versions: HashMap::new(),
            next_id: 1000,
            requests: Vec::new(),
            fail_with: None,
            fail_next: 0,
            reject_updates: false,
            malformed_sources: false,
            omit_etag: false,
        }
    }
}

impl MockState {
    pub fn with_sources(sources: Vec<Value>) -> Self {
        let versions = sources
            .iter()
            .filter_map(|s| s["id"].as_u64())
            .map(|id| (id, 1))
            .collect();
        Self {
            sources,
            versions,
            ..Self::default()
        }
    }
}

/// JSON of a LocalFile source as returned by the API
pub fn local_file_source(
    id: u64,
    name: &str,
    path: &str,
    category: Option<&str>,
    blacklist: &[&str],
) -> Value {
    json!({
        "id": id,
        "name": name,
        "sourceType": "LocalFile",
        "pathExpression": path,
        "category": category,
        "forceTimeZone": false,
        "blacklist": blacklist,
        "alive": true,
        "encoding": "UTF-8"
    })
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockSumo {
    pub state: Shared,
    pub endpoint: String,
}

impl MockSumo {
    pub async fn start(state: MockState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            endpoint: format!("http://{}/api/v1", addr),
        }
    }

    pub fn api(&self) -> SumoApi {
        SumoApi::new(
            &self.endpoint,
            Credentials::new(USERNAME, PASSWORD),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    pub fn collector(&self, name: &str) -> Collector {
        Collector::new(name, self.api())
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn writes(&self) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.is_write()).collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn sources(&self) -> Vec<Value> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut *self.state.lock().unwrap());
    }
}

fn expected_authorization() -> String {
    let encoded = general_purpose::STANDARD.encode(format!("{}:{}", USERNAME, PASSWORD));
    format!("Basic {}", encoded)
}

fn etag(version: u64) -> String {
    format!("\"v{}\"", version)
}

fn status(code: u16, body: Value) -> Response {
    let code = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, axum::Json(body)).into_response()
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();

    let body: Option<Value> = serde_json::from_slice(&body).ok();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        if_match: headers
            .get(header::IF_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected_authorization())
        .unwrap_or(false);
    if !authorized {
        return status(401, json!({"message": "unauthorized"}));
    }

    if let Some(code) = state.fail_with {
        return status(code, json!({"message": "injected failure"}));
    }
    if state.fail_next > 0 {
        state.fail_next -= 1;
        return status(500, json!({"message": "transient failure"}));
    }

    let Some(path) = uri.path().strip_prefix("/api/v1/") else {
        return status(404, json!({"message": "unknown path"}));
    };
    let segments: Vec<&str> = path.split('/').collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["collectors"]) => status(200, json!({ "collectors": state.collectors.clone() })),
        (verb, ["collectors", id, "sources", rest @ ..]) => {
            if id.parse::<u64>().ok() != Some(COLLECTOR_ID) {
                return status(404, json!({"message": "collector not found"}));
            }
            match (verb, rest) {
                ("GET", []) => list_sources(&state),
                ("POST", []) => create_source(&mut state, body),
                (verb, [source_id]) => match source_id.parse::<u64>() {
                    Ok(source_id) => single_source(&mut state, verb, source_id, &headers, body),
                    Err(_) => status(400, json!({"message": "bad source id"})),
                },
                _ => status(405, json!({"message": "method not allowed"})),
            }
        }
        _ => status(404, json!({"message": "unknown path"})),
    }
}

fn list_sources(state: &MockState) -> Response {
    if state.malformed_sources {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }
    status(200, json!({ "sources": state.sources.clone() }))
}

fn create_source(state: &mut MockState, body: Option<Value>) -> Response {
    let Some(mut source) = body.and_then(|b| b.get("source").cloned()) else {
        return status(400, json!({"message": "missing source"}));
    };
    let id = state.next_id;
    state.next_id += 1;
    source["id"] = json!(id);
    state.sources.push(source.clone());
    state.versions.insert(id, 1);
    status(201, json!({ "source": source }))
}

fn single_source(
    state: &mut MockState,
    verb: &str,
    source_id: u64,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Response {
    let Some(index) = state
        .sources
        .iter()
        .position(|s| s["id"].as_u64() == Some(source_id))
    else {
        return status(404, json!({"message": "source not found"}));
    };
    let version = state.versions.get(&source_id).copied().unwrap_or(1);

    match verb {
        "GET" => {
            let mut response = status(200, json!({ "source": state.sources[index].clone() }));
            if !state.omit_etag {
                response.headers_mut().insert(
                    header::ETAG,
                    HeaderValue::from_str(&etag(version)).unwrap(),
                );
            }
            response
        }
        "PUT" => {
            let if_match = headers.get(header::IF_MATCH).and_then(|v| v.to_str().ok());
            if state.reject_updates || if_match != Some(etag(version).as_str()) {
                return status(412, json!({"message": "etag mismatch"}));
            }
            let Some(source) = body.and_then(|b| b.get("source").cloned()) else {
                return status(400, json!({"message": "missing source"}));
            };
            state.sources[index] = source.clone();
            state.versions.insert(source_id, version + 1);
            status(200, json!({ "source": source }))
        }
        "DELETE" => {
            state.sources.remove(index);
            state.versions.remove(&source_id);
            status(200, json!({}))
        }
        _ => status(405, json!({"message": "method not allowed"})),
    }
}
