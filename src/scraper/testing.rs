// Scripted fetcher used by scraper, auditor and worker tests
use super::fetcher::{FetchRequest, FetchResponse, Fetcher};
use crate::model::FetchError;
use async_trait::async_trait;
use std::sync::Mutex;

enum Reply {
    Page { final_url: Option<String>, body: String },
    Status(u16),
}

/// Answers requests from a list of (url substring, reply) routes; first match
/// wins and unmatched URLs get a 404. Every requested URL is recorded.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Vec<(String, Reply)>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, body: impl Into<String>) -> Self {
        self.routes.push((needle.to_string(), Reply::Page { final_url: None, body: body.into() }));
        self
    }

    pub fn redirect(mut self, needle: &str, final_url: &str, body: impl Into<String>) -> Self {
        self.routes.push((
            needle.to_string(),
            Reply::Page { final_url: Some(final_url.to_string()), body: body.into() },
        ));
        self
    }

    pub fn fail(mut self, needle: &str, status: u16) -> Self {
        self.routes.push((needle.to_string(), Reply::Status(status)));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = req.full_url()?.to_string();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.clone());
        }

        let reply = self
            .routes
            .iter()
            .find(|(needle, _)| url.contains(needle.as_str()))
            .map(|(_, reply)| reply);

        match reply {
            Some(Reply::Page { final_url, body }) => Ok(FetchResponse {
                status: 200,
                final_url: final_url.clone().unwrap_or(url),
                body: body.clone(),
            }),
            Some(Reply::Status(status)) => Err(FetchError::InvalidResponse(*status)),
            None => Err(FetchError::InvalidResponse(404)),
        }
    }
}
