use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};

use super::{build_url, FetchedPage, Transport};

#[derive(Clone)]
enum Reply {
    Text(String),
    Bytes(Vec<u8>),
    Status(u16),
}

/// In-memory transport keyed by full URL (query included).
#[derive(Default)]
pub struct StubTransport {
    replies: Mutex<HashMap<String, Reply>>,
    delays: Mutex<HashMap<String, Duration>>,
    pub calls: AtomicUsize,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.insert(url, Reply::Text(body.to_string()));
        self
    }

    pub fn bytes(self, url: &str, bytes: &[u8]) -> Self {
        self.insert(url, Reply::Bytes(bytes.to_vec()));
        self
    }

    pub fn status(self, url: &str, status: u16) -> Self {
        self.insert(url, Reply::Status(status));
        self
    }

    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
        self
    }

    fn insert(&self, url: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(url.to_string(), reply);
    }

    async fn reply(&self, url: &str) -> Result<Reply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Status(status)) => Err(AppError::UnexpectedStatus {
                url: url.to_string(),
                status,
            }),
            Some(reply) => Ok(reply),
            None => Err(AppError::UnexpectedStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn get_page(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage> {
        let url = build_url(url, query)?.to_string();
        match self.reply(&url).await? {
            Reply::Text(body) => Ok(FetchedPage { url, body }),
            Reply::Bytes(bytes) => Ok(FetchedPage {
                url,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
            Reply::Status(_) => unreachable!("status replies are returned as errors"),
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        match self.reply(url).await? {
            Reply::Bytes(bytes) => Ok(bytes),
            Reply::Text(body) => Ok(body.into_bytes()),
            Reply::Status(_) => unreachable!("status replies are returned as errors"),
        }
    }
}
