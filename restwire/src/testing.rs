//! Shared fixtures for unit tests.

use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use parking_lot::Mutex;
use restwire_client::{FnTransport, HttpClient, HttpRequest, HttpResponse, Transport};

use crate::contract::{Contract, RestClient};
use crate::request_builder::RequestBuilder;

pub(crate) trait Pinger: Send + Sync {
    fn rest(&self) -> &RestClient;
}

pub(crate) trait Other: Send + Sync {}

struct PingerClient(RestClient);

impl Pinger for PingerClient {
    fn rest(&self) -> &RestClient {
        &self.0
    }
}

impl Other for PingerClient {}

impl Contract for dyn Pinger {
    fn create(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<Self> {
        Arc::new(PingerClient(RestClient::new(client, builder)))
    }
}

impl Contract for dyn Other {
    fn create(client: HttpClient, builder: Arc<dyn RequestBuilder>) -> Arc<Self> {
        Arc::new(PingerClient(RestClient::new(client, builder)))
    }
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub uri: String,
    pub headers: HeaderMap,
}

pub(crate) type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Transport that records requests and answers with `label`.
pub(crate) fn recording_transport(label: &'static str) -> (Arc<dyn Transport>, Recorded) {
    let seen: Recorded = Arc::default();
    let log = seen.clone();
    let transport = FnTransport::new(move |req: HttpRequest| {
        log.lock().push(RecordedRequest {
            uri: req.uri().to_string(),
            headers: req.headers().clone(),
        });
        async move { Ok(HttpResponse::new(Bytes::from_static(label.as_bytes()))) }
    });
    (Arc::new(transport), seen)
}

pub(crate) fn request(uri: &str) -> HttpRequest {
    http::Request::builder()
        .uri(uri)
        .body(Bytes::new())
        .expect("valid request")
}
