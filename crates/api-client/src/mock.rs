//! Scripted in-memory [`Transport`] for tests.
//!
//! Responses are queued per `(method, path)` route and consumed in order.
//! Every request is recorded so tests can assert on headers and bodies.
//! A request with nothing scripted fails with a connect error, which the
//! client reports as `NETWORK_ERROR`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

type Reply = std::result::Result<HttpResponse, TransportError>;

enum Step {
    Ready(Reply),
    /// Held until the paired `Notify` fires.
    Gated(Arc<Notify>, Reply),
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Step>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `method path` request.
    pub fn on(&self, method: Method, path: &str, response: HttpResponse) {
        self.push(method, path, Step::Ready(Ok(response)));
    }

    /// Queue a transport failure for the next `method path` request.
    pub fn fail(&self, method: Method, path: &str, error: TransportError) {
        self.push(method, path, Step::Ready(Err(error)));
    }

    /// Queue a response that is only delivered once the returned gate is
    /// notified. Models an in-flight call that settles later.
    pub fn on_gated(&self, method: Method, path: &str, response: HttpResponse) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.push(method, path, Step::Gated(gate.clone(), Ok(response)));
        gate
    }

    /// All requests received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Requests received for one route.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn push(&self, method: Method, path: &str, step: Step) {
        self.routes
            .lock()
            .entry((method, path.to_owned()))
            .or_default()
            .push_back(step);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Reply {
        let key = (request.method, path_of(&request.url).to_owned());
        self.requests.lock().push(request);

        let step = self
            .routes
            .lock()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match step {
            Some(Step::Ready(reply)) => reply,
            Some(Step::Gated(gate, reply)) => {
                gate.notified().await;
                reply
            }
            None => Err(TransportError::Connect(format!(
                "no scripted response for {} {}",
                key.0, key.1
            ))),
        }
    }
}

/// Path (and query) portion of an absolute URL.
fn path_of(url: &str) -> &str {
    let after_scheme = url.find("://").map_or(url, |i| &url[i + 3..]);
    after_scheme
        .find('/')
        .map_or("/", |i| &after_scheme[i..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(url: &str) -> HttpRequest {
        HttpRequest {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn path_extraction() {
        assert_eq!(path_of("http://localhost:8000/api/auth/profile"), "/api/auth/profile");
        assert_eq!(path_of("https://folio.example.com"), "/");
        assert_eq!(path_of("/api/x?y=1"), "/api/x?y=1");
    }

    #[tokio::test]
    async fn scripted_responses_are_consumed_in_order() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "/a", HttpResponse::empty(200));
        mock.on(Method::Get, "/a", HttpResponse::empty(500));

        assert_eq!(mock.send(get("http://h/a")).await.unwrap().status, 200);
        assert_eq!(mock.send(get("http://h/a")).await.unwrap().status, 500);
        assert!(matches!(
            mock.send(get("http://h/a")).await,
            Err(TransportError::Connect(_))
        ));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn gated_response_waits_for_release() {
        let mock = Arc::new(MockTransport::new());
        let gate = mock.on_gated(Method::Get, "/slow", HttpResponse::empty(204));

        let handle = {
            let mock = mock.clone();
            tokio::spawn(async move { mock.send(get("http://h/slow")).await })
        };
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        gate.notify_one();
        assert_eq!(handle.await.unwrap().unwrap().status, 204);
    }
}
