//! In-process fakes for engine and scheduler tests
//!
//! The fakes never touch real I/O so they behave under paused tokio time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use linkvault_core::domain::{
    BookmarkId, BookmarkMetadata, Domain, HttpResponse, MetadataRequest, QueuedRequest,
    RequestSnapshot,
};
use linkvault_core::ports::{IDataSink, IHttpFetcher, IRequestQueue};
use tokio::time::Instant;

pub const METADATA_URL: &str = "http://127.0.0.1:5173/api/fetch-metadata";

/// A metadata request for bookmark `id` pointing at `https://<id>.example.com/`
pub fn metadata_request(id: &str) -> RequestSnapshot {
    RequestSnapshot::post_json(
        METADATA_URL,
        &MetadataRequest::new(id, format!("https://{}.example.com/", id.to_lowercase())),
    )
    .unwrap()
}

// ============================================================================
// MemoryQueue
// ============================================================================

#[derive(Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<String>>,
}

impl MemoryQueue {
    pub fn payloads(&self) -> Vec<String> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl IRequestQueue for MemoryQueue {
    async fn push(&self, entry: &QueuedRequest) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push_back(entry.to_json()?);
        Ok(())
    }

    async fn shift(&self) -> anyhow::Result<Option<QueuedRequest>> {
        let payload = self.entries.lock().unwrap().pop_front();
        Ok(payload.map(|p| QueuedRequest::from_json(&p)).transpose()?)
    }

    async fn unshift(&self, entry: &QueuedRequest) -> anyhow::Result<()> {
        self.entries.lock().unwrap().push_front(entry.to_json()?);
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }
}

// ============================================================================
// FakeFetcher
// ============================================================================

/// Scripted reply of the fake fetcher
#[derive(Debug, Clone)]
pub enum Reply {
    Response(HttpResponse),
    NetworkError,
    /// Never completes; exercises the request timeout
    Hang,
}

impl Reply {
    pub fn metadata(id: &str) -> Self {
        let body = serde_json::json!({ "bookmarkId": id, "title": format!("Title {id}") });
        Self::Response(HttpResponse::new(200).with_body(body.to_string().into_bytes()))
    }

    pub fn status(status: u16) -> Self {
        Self::Response(HttpResponse::new(status))
    }

    pub fn rate_limited(retry_after: &str) -> Self {
        Self::Response(HttpResponse::new(429).with_header("Retry-After", retry_after))
    }
}

/// Replays scripted replies in order; once exhausted every call fails
#[derive(Default)]
pub struct FakeFetcher {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeFetcher {
    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IHttpFetcher for FakeFetcher {
    async fn fetch(&self, _request: &RequestSnapshot) -> anyhow::Result<HttpResponse> {
        self.calls.lock().unwrap().push(Instant::now());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::NetworkError) | None => Err(anyhow::anyhow!("connection refused")),
        }
    }
}

// ============================================================================
// FakeSink
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkState {
    Pending,
    Error(String),
    Success { title: Option<String> },
}

#[derive(Default)]
pub struct FakeSink {
    states: Mutex<HashMap<String, SinkState>>,
    successes: Mutex<Vec<String>>,
    favicons: Mutex<Vec<(String, Option<String>, bool, Option<String>)>>,
}

impl FakeSink {
    pub fn state(&self, id: &str) -> Option<SinkState> {
        self.states.lock().unwrap().get(id).cloned()
    }

    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().unwrap().clone()
    }

    pub fn favicons(&self) -> Vec<(String, Option<String>, bool, Option<String>)> {
        self.favicons.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IDataSink for FakeSink {
    async fn set_pending(&self, id: &BookmarkId) -> anyhow::Result<()> {
        self.states
            .lock()
            .unwrap()
            .insert(id.to_string(), SinkState::Pending);
        Ok(())
    }

    async fn set_success(
        &self,
        id: &BookmarkId,
        _metadata: &BookmarkMetadata,
        title: Option<&str>,
    ) -> anyhow::Result<()> {
        self.states.lock().unwrap().insert(
            id.to_string(),
            SinkState::Success {
                title: title.map(str::to_string),
            },
        );
        self.successes.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn set_error(&self, id: &BookmarkId, reason: &str) -> anyhow::Result<()> {
        self.states
            .lock()
            .unwrap()
            .insert(id.to_string(), SinkState::Error(reason.to_string()));
        Ok(())
    }

    async fn save_favicon(
        &self,
        domain: &Domain,
        data: Option<&str>,
        failed: bool,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        self.favicons.lock().unwrap().push((
            domain.to_string(),
            data.map(str::to_string),
            failed,
            reason.map(str::to_string),
        ));
        Ok(())
    }
}
