//! In-memory transport and clock for deterministic tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::request::{Clock, RawResponse, Transport};
use crate::TransportError;

/// Clock that only moves when something sleeps on it.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
            sleeps: Arc::default(),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        *self.now.lock().unwrap() += duration;
    }
}

#[derive(Clone)]
pub enum Reply {
    Ok {
        status: u16,
        content_type: Option<&'static str>,
        body: Vec<u8>,
    },
    Timeout,
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Self::Ok {
            status: 200,
            content_type: Some("application/json; charset=utf-8"),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn pdf(body: &[u8]) -> Self {
        Self::Ok {
            status: 200,
            content_type: Some("application/pdf"),
            body: body.to_vec(),
        }
    }

    pub fn html(body: &str) -> Self {
        Self::Ok {
            status: 200,
            content_type: Some("text/html; charset=utf-8"),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self::Ok {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }
}

/// Scripted transport. Each path replays its queue of replies; the last
/// one repeats. Unknown paths answer 404.
#[derive(Clone)]
pub struct FakeTransport {
    clock: ManualClock,
    routes: Arc<Mutex<HashMap<String, VecDeque<Reply>>>>,
    calls: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl FakeTransport {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            clock: clock.clone(),
            routes: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn route(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_owned(), replies.into_iter().collect());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<RawResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_owned(), self.clock.now()));

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(path) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Ok {
                status,
                content_type,
                body,
            }) => Ok(RawResponse {
                status,
                content_type: content_type.map(String::from),
                body,
            }),
            Some(Reply::Timeout) => Err(TransportError::Timeout(format!("{path} timed out"))),
            None => Ok(RawResponse {
                status: 404,
                content_type: None,
                body: Vec::new(),
            }),
        }
    }
}
