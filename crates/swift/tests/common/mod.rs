//! In-process SWIFT server for integration tests
//!
//! Understands just enough of the object storage API to exercise the
//! filesystem: account and container listings (with `prefix` and
//! `delimiter`), ranged GET, HEAD, PUT with `ETag` verification and DELETE.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE};
use http::Method;
use serde_json::json;
use swiftfs_swift::{
    content_etag, fixed_factory, HttpTransport, SwiftConfig, SwiftFileSystem, SwiftRequest,
    SwiftResponse, AUTH_TOKEN_HEADER,
};
use swiftfs_vfs::Result;

pub const HOST: &str = "server";
pub const ACCOUNT: &str = "a";
pub const CONTAINER: &str = "c";
pub const MODIFIED: &str = "2021-11-10T13:42:02.919330";

/// `swift://server/a/c/{key}`
pub fn object_url(key: &str) -> String {
    format!("swift://{HOST}/{ACCOUNT}/{CONTAINER}/{key}")
}

pub fn container_url() -> String {
    format!("swift://{HOST}/{ACCOUNT}/{CONTAINER}")
}

#[derive(Default)]
struct Store {
    /// (account, container)
    containers: BTreeSet<(String, String)>,
    /// (account, container, key)
    objects: BTreeMap<(String, String, String), Bytes>,
}

#[derive(Default)]
pub struct SwiftEmulator {
    store: Mutex<Store>,
    /// When set, requests without this token get 401
    token: Option<String>,
    requests: Mutex<Vec<SwiftRequest>>,
}

impl SwiftEmulator {
    /// Server holding container `a/c` with a small tree of objects
    pub fn with_sample_data() -> Arc<Self> {
        let emulator = Self::default();
        emulator.seed();
        Arc::new(emulator)
    }

    /// Sample data, reachable only with `token`
    pub fn with_token(token: &str) -> Arc<Self> {
        let emulator = Self {
            token: Some(token.to_string()),
            ..Self::default()
        };
        emulator.seed();
        Arc::new(emulator)
    }

    fn seed(&self) {
        self.create_container(ACCOUNT, CONTAINER);
        self.put(ACCOUNT, CONTAINER, "hello", b"Hello World");
        self.put(ACCOUNT, CONTAINER, "f/test.txt", b"test");
        self.put(ACCOUNT, CONTAINER, "f/folder2/deep.txt", b"deep");
    }

    pub fn create_container(&self, account: &str, container: &str) {
        self.store
            .lock()
            .unwrap()
            .containers
            .insert((account.to_string(), container.to_string()));
    }

    pub fn put(&self, account: &str, container: &str, key: &str, data: &[u8]) {
        self.store.lock().unwrap().objects.insert(
            (account.to_string(), container.to_string(), key.to_string()),
            Bytes::copy_from_slice(data),
        );
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.store
            .lock()
            .unwrap()
            .objects
            .get(&(ACCOUNT.to_string(), CONTAINER.to_string(), key.to_string()))
            .cloned()
    }

    pub fn requests(&self) -> Vec<SwiftRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Filesystem wired to this server
    pub fn filesystem(self: &Arc<Self>) -> SwiftFileSystem {
        self.filesystem_with(SwiftConfig::default())
    }

    pub fn filesystem_with(self: &Arc<Self>, config: SwiftConfig) -> SwiftFileSystem {
        SwiftFileSystem::with_factory(config, fixed_factory(self.clone()))
    }

    fn authorized(&self, request: &SwiftRequest) -> bool {
        match &self.token {
            None => true,
            Some(token) => request
                .headers
                .get(AUTH_TOKEN_HEADER)
                .is_some_and(|value| value.as_bytes() == token.as_bytes()),
        }
    }

    fn handle(&self, request: &SwiftRequest) -> SwiftResponse {
        if !self.authorized(request) {
            return SwiftResponse::new(401);
        }
        let prefix = format!("https://{HOST}/v1/");
        let Some(path) = request.url.strip_prefix(&prefix) else {
            return SwiftResponse::new(400);
        };
        let mut segments = path.splitn(3, '/');
        let account = segments.next().unwrap_or_default().to_string();
        let container = segments.next().map(str::to_string);
        let key = segments.next().map(str::to_string);

        match (container, key) {
            (None, _) if request.method == Method::GET => self.list_account(&account),
            (Some(container), None) if request.method == Method::GET => {
                self.list_container(&account, &container, request)
            }
            (Some(container), Some(key)) => {
                let id = (account, container, key);
                match request.method {
                    Method::GET => self.get(&id, request),
                    Method::HEAD => self.head(&id),
                    Method::PUT => self.store_object(id, request),
                    Method::DELETE => self.delete(&id),
                    _ => SwiftResponse::new(405),
                }
            }
            _ => SwiftResponse::new(405),
        }
    }

    fn list_account(&self, account: &str) -> SwiftResponse {
        let store = self.store.lock().unwrap();
        let entries: Vec<_> = store
            .containers
            .iter()
            .filter(|(acct, _)| acct == account)
            .map(|(_, name)| {
                let objects = store
                    .objects
                    .iter()
                    .filter(|((acct, cont, _), _)| acct == account && cont == name);
                let (count, bytes) =
                    objects.fold((0, 0), |(n, b), (_, data)| (n + 1, b + data.len()));
                json!({"name": name, "count": count, "bytes": bytes, "last_modified": MODIFIED})
            })
            .collect();
        json_response(&entries)
    }

    fn list_container(
        &self,
        account: &str,
        container: &str,
        request: &SwiftRequest,
    ) -> SwiftResponse {
        let store = self.store.lock().unwrap();
        if !store.containers.contains(&(account.to_string(), container.to_string())) {
            return SwiftResponse::new(404);
        }
        let prefix = request.query_value("prefix").unwrap_or_default();
        let delimiter = request.query_value("delimiter");

        let mut entries = Vec::new();
        let mut last_subdir = None;
        for ((acct, cont, key), data) in &store.objects {
            if acct != account || cont != container {
                continue;
            }
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some(idx) = delimiter.and_then(|d| rest.find(d)) {
                let subdir = format!("{prefix}{}", &rest[..=idx]);
                if last_subdir.as_ref() != Some(&subdir) {
                    entries.push(json!({"subdir": subdir}));
                    last_subdir = Some(subdir);
                }
                continue;
            }
            entries.push(json!({
                "name": key,
                "bytes": data.len(),
                "hash": content_etag(data),
                "last_modified": MODIFIED,
                "content_type": "application/octet-stream",
            }));
        }
        json_response(&entries)
    }

    fn get(&self, id: &(String, String, String), request: &SwiftRequest) -> SwiftResponse {
        let Some(data) = self.store.lock().unwrap().objects.get(id).cloned() else {
            return SwiftResponse::new(404);
        };
        let Some(range) = request.headers.get(RANGE).and_then(|v| v.to_str().ok()) else {
            let mut response = SwiftResponse::new(200);
            response.body = data;
            return response;
        };

        let Some((start, end)) = range
            .strip_prefix("bytes=")
            .and_then(|bounds| bounds.split_once('-'))
        else {
            return SwiftResponse::new(400);
        };
        let len = data.len();
        let start: usize = start.parse().unwrap_or(0);
        let end = end.parse::<usize>().map_or(len, |last| (last + 1).min(len));
        if start >= len {
            return SwiftResponse::new(416);
        }
        let mut response = SwiftResponse::new(206);
        response.body = data.slice(start..end);
        response
    }

    fn head(&self, id: &(String, String, String)) -> SwiftResponse {
        let Some(data) = self.store.lock().unwrap().objects.get(id).cloned() else {
            return SwiftResponse::new(404);
        };
        let mut response = SwiftResponse::new(200);
        response.headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len()));
        response
            .headers
            .insert(ETAG, HeaderValue::from_str(&content_etag(&data)).unwrap());
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        response
            .headers
            .insert(LAST_MODIFIED, HeaderValue::from_static("Wed, 10 Nov 2021 13:42:03 GMT"));
        response
    }

    fn store_object(&self, id: (String, String, String), request: &SwiftRequest) -> SwiftResponse {
        let mut store = self.store.lock().unwrap();
        if !store.containers.contains(&(id.0.clone(), id.1.clone())) {
            return SwiftResponse::new(404);
        }
        let body = request.body.clone().unwrap_or_default();
        let declared = request
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len != body.len()) {
            return SwiftResponse::new(400);
        }
        let etag = content_etag(&body);
        if let Some(expected) = request.headers.get(ETAG) {
            if expected.as_bytes() != etag.as_bytes() {
                return SwiftResponse::new(422);
            }
        }
        store.objects.insert(id, body);

        let mut response = SwiftResponse::new(201);
        response.headers.insert(ETAG, HeaderValue::from_str(&etag).unwrap());
        response
    }

    fn delete(&self, id: &(String, String, String)) -> SwiftResponse {
        match self.store.lock().unwrap().objects.remove(id) {
            Some(_) => SwiftResponse::new(204),
            None => SwiftResponse::new(404),
        }
    }
}

fn json_response(entries: &[serde_json::Value]) -> SwiftResponse {
    let mut response = SwiftResponse::new(200);
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
    response.body = Bytes::from(serde_json::to_vec(entries).unwrap());
    response
}

#[async_trait]
impl HttpTransport for SwiftEmulator {
    async fn execute(&self, request: SwiftRequest) -> Result<SwiftResponse> {
        let response = self.handle(&request);
        self.requests.lock().unwrap().push(request);
        Ok(response)
    }
}
