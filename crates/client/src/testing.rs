//! Shared test utilities for code built on [`Network`].
//!
//! `StubNetwork` answers from an in-process table so router, delivery and
//! lifecycle tests can switch connectivity per URL without sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use harbor_core::{Error, Request, Response};
use serde_json::Value;
use url::Url;

use crate::network::Network;

#[derive(Debug, Clone)]
enum Reply {
    Respond(Response),
    Fail,
}

#[derive(Debug, Default)]
struct State {
    fetch_replies: HashMap<String, Reply>,
    post_replies: HashMap<String, Result<u16, ()>>,
    fetched: Vec<String>,
    posted: Vec<(String, Value)>,
}

/// In-process network with per-URL replies.
///
/// Unknown fetch URLs answer 404; unknown POST URLs answer 200.
#[derive(Debug, Default)]
pub struct StubNetwork {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl StubNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: &str, response: Response) {
        self.state().fetch_replies.insert(url.to_string(), Reply::Respond(response));
    }

    /// Answer `url` with a 200 carrying `body`.
    pub fn respond_ok(&self, url: &str, body: &'static str) {
        self.respond(url, Response::new(200, body));
    }

    /// Make fetches of `url` fail with a network error.
    pub fn fail(&self, url: &str) {
        self.state().fetch_replies.insert(url.to_string(), Reply::Fail);
    }

    /// Answer POSTs to `url` with `status`.
    pub fn post_status(&self, url: &str, status: u16) {
        self.state().post_replies.insert(url.to_string(), Ok(status));
    }

    /// Make POSTs to `url` fail with a network error.
    pub fn fail_post(&self, url: &str) {
        self.state().post_replies.insert(url.to_string(), Err(()));
    }

    /// Drop every connection attempt, fetches and POSTs alike.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// URLs fetched so far, including failed attempts.
    pub fn fetched(&self) -> Vec<String> {
        self.state().fetched.clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.state().fetched.iter().filter(|u| *u == url).count()
    }

    /// POSTs attempted so far, including failed ones.
    pub fn posted(&self) -> Vec<(String, Value)> {
        self.state().posted.clone()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        let reply = {
            let mut state = self.state();
            state.fetched.push(url.clone());
            state.fetch_replies.get(&url).cloned()
        };

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail) => Err(Error::Network(format!("connection refused: {url}"))),
            None => Ok(Response::new(404, "")),
        }
    }

    async fn post_json(&self, url: &Url, body: &Value) -> Result<u16, Error> {
        let url = url.to_string();
        let reply = {
            let mut state = self.state();
            state.posted.push((url.clone(), body.clone()));
            state.post_replies.get(&url).cloned()
        };

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        match reply {
            Some(Ok(status)) => Ok(status),
            Some(Err(())) => Err(Error::Network(format!("connection refused: {url}"))),
            None => Ok(200),
        }
    }
}
