use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SessionError;
use crate::http::{ApiRequest, ApiResponse, Transport};

type Handler = Arc<dyn Fn(&ApiRequest) -> Result<ApiResponse, SessionError> + Send + Sync>;

struct Route {
    delay: Option<Duration>,
    handler: Handler,
}

/// Scripted in-memory transport that records every request it sees.
/// Unscripted paths answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, path: &str, handler: F)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        self.insert(path, None, Arc::new(move |request| Ok(handler(request))));
    }

    /// Like `on`, but the response is held back for `delay`
    pub fn on_delayed<F>(&self, path: &str, delay: Duration, handler: F)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        self.insert(path, Some(delay), Arc::new(move |request| Ok(handler(request))));
    }

    /// Fail at the transport level (no response at all)
    pub fn fail(&self, path: &str, message: &str) {
        let message = message.to_string();
        self.insert(path, None, Arc::new(move |_| Err(SessionError::Transport(message.clone()))));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    fn insert(&self, path: &str, delay: Option<Duration>, handler: Handler) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route { delay, handler });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, SessionError> {
        self.requests.lock().unwrap().push(request.clone());

        let route = {
            let routes = self.routes.lock().unwrap();
            routes.get(&request.path).map(|r| (r.delay, Arc::clone(&r.handler)))
        };

        match route {
            Some((delay, handler)) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                handler(request)
            }
            None => Ok(json_response(404, serde_json::json!({ "message": "Not Found" }))),
        }
    }
}

pub fn json_response(status: u16, body: Value) -> ApiResponse {
    let status = StatusCode::from_u16(status).unwrap();
    ApiResponse::from_json(status, &body)
}
