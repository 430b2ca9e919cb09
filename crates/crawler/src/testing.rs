//! In-memory test doubles for the transport and sleeper seams

use crate::transport::{Sleeper, Transport, TransportResponse};
use async_trait::async_trait;
use citeforge_common::errors::Result;
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Handler = Box<dyn Fn(&Url) -> Result<TransportResponse> + Send + Sync>;

/// Transport answering from a closure and recording every requested URL
pub struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    pub fn from_fn<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&Url) -> Result<TransportResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answer with the given outcomes in order, then 404 forever
    pub fn sequence(outcomes: Vec<Result<TransportResponse>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(outcomes));
        Self::from_fn(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TransportResponse::new(404, "exhausted")))
        })
    }

    /// Serve single-work lookups from a fixed set of works
    pub fn works(works: Vec<Value>) -> Arc<Self> {
        let by_id: HashMap<String, Value> = works
            .into_iter()
            .map(|work| {
                let id = work["id"].as_str().unwrap().rsplit('/').next().unwrap().to_string();
                (id, work)
            })
            .collect();

        Self::from_fn(move |url| {
            let id = url.path_segments().unwrap().last().unwrap().to_string();
            match by_id.get(&id) {
                Some(work) => Ok(TransportResponse::new(200, work.to_string())),
                None => Ok(TransportResponse::new(404, "not found")),
            }
        })
    }

    /// Serve `/works` collection queries over `total` synthetic works
    ///
    /// Honors `per_page` (capped at 200), `page` and `cursor`. Cursors are
    /// stringified offsets.
    pub fn collection(total: usize) -> Arc<Self> {
        Self::from_fn(move |url| {
            let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
            let per_page: usize = params
                .get("per_page")
                .and_then(|p| p.parse().ok())
                .unwrap_or(25)
                .min(200);

            let (offset, cursor_mode) = match params.get("cursor") {
                Some(cursor) if cursor == "*" => (0, true),
                Some(cursor) => (cursor.parse().unwrap(), true),
                None => {
                    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                    ((page - 1) * per_page, false)
                }
            };

            let end = (offset + per_page).min(total);
            let results: Vec<Value> = (offset.min(end)..end).map(|i| synthetic_work(i + 1, &[])).collect();
            let next_cursor = if cursor_mode && end < total {
                Value::String(end.to_string())
            } else {
                Value::Null
            };

            let body = json!({
                "meta": {"count": total, "per_page": per_page, "next_cursor": next_cursor},
                "results": results,
            });
            Ok(TransportResponse::new(200, body.to_string()))
        })
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(url.clone());
        (self.handler)(url)
    }
}

/// Sleeper that returns immediately and remembers what it was asked
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Work object shaped like an OpenAlex response
pub fn synthetic_work(n: usize, references: &[usize]) -> Value {
    json!({
        "id": format!("https://openalex.org/W{}", n),
        "title": format!("Work {}", n),
        "publication_year": 2000 + (n % 25),
        "referenced_works": references
            .iter()
            .map(|r| format!("https://openalex.org/W{}", r))
            .collect::<Vec<_>>(),
    })
}
