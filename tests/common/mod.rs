//! Shared test helpers: record builders and a fake Feishu HTTP server.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tiny_http::{Header, Response, Server};

use bitable_sync::models::RemoteRecord;

pub fn record(id: &str, fields: Value) -> RemoteRecord {
    serde_json::from_value(json!({ "record_id": id, "fields": fields })).unwrap()
}

/// One request seen by [`FakeFeishu`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl SeenRequest {
    pub fn query_param(&self, name: &str) -> Option<String> {
        query_param(&self.url, name)
    }
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// Minimal Feishu Open API stand-in.
///
/// Serves the token endpoint and, for each table, a fixed list of pages.
/// Page `n > 0` is addressed by `page_token=p{n}`.
pub struct FakeFeishu {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    pub base_url: String,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

#[derive(Clone, Default)]
pub struct FakeTables {
    /// Token endpoint body; defaults to a successful response.
    pub token_body: Option<Value>,
    pub tables: HashMap<String, Vec<PageSpec>>,
}

#[derive(Clone)]
pub enum PageSpec {
    Records(Vec<Value>),
    /// Respond with this HTTP status and raw body.
    Raw(u16, String),
}

impl FakeTables {
    pub fn table(mut self, table_id: &str, pages: Vec<PageSpec>) -> Self {
        self.tables.insert(table_id.to_string(), pages);
        self
    }

    pub fn token_body(mut self, body: Value) -> Self {
        self.token_body = Some(body);
        self
    }
}

pub fn item(id: &str, fields: Value) -> Value {
    json!({ "record_id": id, "fields": fields })
}

impl FakeFeishu {
    pub fn start(fake: FakeTables) -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}/open-apis", port);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let seen = SeenRequest {
                        method: request.method().to_string(),
                        url: request.url().to_string(),
                        authorization: request
                            .headers()
                            .iter()
                            .find(|h| h.field.equiv("Authorization"))
                            .map(|h| h.value.as_str().to_string()),
                        body,
                    };
                    let (status, body) = respond(&fake, &seen);
                    requests.lock().unwrap().push(seen);

                    let response = Response::from_string(body)
                        .with_status_code(status)
                        .with_header(
                            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                                .unwrap(),
                        );
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            handle: Some(handle),
            base_url,
            requests,
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Record-list requests for `table_id`, in arrival order.
    pub fn page_requests(&self, table_id: &str) -> Vec<SeenRequest> {
        let needle = format!("/tables/{}/records", table_id);
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(&needle))
            .collect()
    }
}

impl Drop for FakeFeishu {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond(fake: &FakeTables, req: &SeenRequest) -> (u16, String) {
    let path = req.url.split('?').next().unwrap_or("");

    if path.ends_with("/auth/v3/tenant_access_token/internal") {
        let body = fake.token_body.clone().unwrap_or_else(|| {
            json!({ "code": 0, "msg": "ok", "tenant_access_token": "t-fake", "expire": 7200 })
        });
        return (200, body.to_string());
    }

    let Some(table_id) = path
        .strip_suffix("/records")
        .and_then(|p| p.rsplit('/').next())
    else {
        return (404, "not found".to_string());
    };
    let Some(pages) = fake.tables.get(table_id) else {
        return (
            200,
            json!({ "code": 91402, "msg": "NOTEXIST" }).to_string(),
        );
    };

    let index = match req.query_param("page_token") {
        None => 0,
        Some(token) => match token.strip_prefix('p').and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => n,
            None => return (200, json!({ "code": 1254040, "msg": "bad page_token" }).to_string()),
        },
    };

    match pages.get(index) {
        Some(PageSpec::Records(items)) => {
            let has_more = index + 1 < pages.len();
            let mut data = json!({ "items": items, "has_more": has_more, "total": items.len() });
            if has_more {
                data["page_token"] = json!(format!("p{}", index + 1));
            }
            (200, json!({ "code": 0, "msg": "success", "data": data }).to_string())
        }
        Some(PageSpec::Raw(status, body)) => (*status, body.clone()),
        None => (200, json!({ "code": 1254040, "msg": "page out of range" }).to_string()),
    }
}
