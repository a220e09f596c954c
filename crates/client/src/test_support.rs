//! Scripted upstream and cache doubles used by the strategy and lifecycle tests.

use crate::fetch::Fetcher;
use aquasentry_core::{CacheDb, CacheStorage, Error, InterceptedRequest, RequestIdentity, ResponseSnapshot};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Clone)]
enum Scripted {
    Respond(ResponseSnapshot),
    Fail,
}

/// In-process upstream with per-path answers and an online switch.
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    online: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            delay: Mutex::new(None),
        }
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Scripted::Respond(ResponseSnapshot::new(status, vec![], body.to_string())));
        self
    }

    pub fn fail(&self, path: &str) -> &Self {
        self.routes.lock().unwrap().insert(path.to_string(), Scripted::Fail);
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        self.calls.lock().unwrap().push(request.path.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }

        let scripted = self.routes.lock().unwrap().get(&request.path).cloned();
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail) => Err(Error::Network(format!("connection reset for {}", request.path))),
            None => Ok(ResponseSnapshot::new(404, vec![], "Not Found")),
        }
    }
}

/// Real in-memory cache whose store deletion always fails.
pub struct UndeletableCache {
    inner: CacheDb,
}

impl UndeletableCache {
    pub fn new(inner: CacheDb) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl CacheStorage for UndeletableCache {
    async fn open(&self, store: &str) -> Result<(), Error> {
        self.inner.open_store(store).await
    }

    async fn match_entry(&self, store: &str, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, Error> {
        self.inner.match_entry(store, identity).await
    }

    async fn put(&self, store: &str, identity: &RequestIdentity, response: &ResponseSnapshot) -> Result<(), Error> {
        self.inner.put_entry(store, identity, response).await
    }

    async fn put_all(&self, store: &str, entries: Vec<(RequestIdentity, ResponseSnapshot)>) -> Result<(), Error> {
        self.inner.put_batch(store, entries).await
    }

    async fn delete(&self, store: &str) -> Result<bool, Error> {
        Err(Error::InvalidState(format!("{store} is locked")))
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.list_stores().await
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        self.inner.count_entries(store).await
    }

    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        self.inner.trim_store(store, max_entries).await
    }
}
