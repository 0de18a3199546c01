use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use linkdoc::{DocumentError, Response, Transport};
use reqwest::Url;

#[derive(Default)]
struct State {
    documents: HashMap<String, Response>,
    store_response: Option<Response>,
    fetches: Vec<String>,
    stored: Vec<(String, String)>,
    authorizations: Vec<Option<String>>,
    delay: Option<Duration>,
}

/// In-memory transport serving canned responses per URL.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

#[allow(dead_code)]
impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.respond(url, Response::ok(body));
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.state.lock().unwrap().documents.insert(url.to_string(), response);
    }

    pub fn respond_to_store(&self, response: Response) {
        self.state.lock().unwrap().store_response = Some(response);
    }

    pub fn delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn fetches(&self, url: &str) -> usize {
        self.state.lock().unwrap().fetches.iter().filter(|u| u.as_str() == url).count()
    }

    pub fn stored(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().authorizations.clone()
    }

    async fn pause(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, url: &Url, authorization: Option<&str>) -> Result<Response, DocumentError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.fetches.push(url.to_string());
        state.authorizations.push(authorization.map(str::to_string));
        Ok(state
            .documents
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| Response::ok("not found").with_status(404)))
    }

    async fn post(&self, url: &Url, body: String, authorization: Option<&str>) -> Result<Response, DocumentError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.stored.push((url.to_string(), body));
        state.authorizations.push(authorization.map(str::to_string));
        Ok(state.store_response.clone().unwrap_or_else(|| Response::ok("")))
    }
}
