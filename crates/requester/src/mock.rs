//! Scripted in-memory requester for tests
//!
//! A `MockRequester` answers each request from a handler closure and keeps a
//! log of every request it saw. Handlers may hold state (counters, queues) so
//! a test can model a server whose answers change over time.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use crate::error::Result;
use crate::{ApiRequest, ApiResponse, Method, Requester};

type Handler = Box<dyn FnMut(&ApiRequest) -> ApiResponse + Send>;

/// Requester that answers from a closure and records every call.
pub struct MockRequester {
    handler: Mutex<Handler>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockRequester {
    pub fn new(handler: impl FnMut(&ApiRequest) -> ApiResponse + Send + 'static) -> Self {
        Self {
            handler: Mutex::new(Box::new(handler)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `responses` in order; the last one repeats forever.
    pub fn sequence(responses: Vec<ApiResponse>) -> Self {
        let mut queue: VecDeque<ApiResponse> = responses.into();
        Self::new(move |_| {
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(|| ApiResponse::empty(500))
            } else {
                queue.front().cloned().unwrap_or_else(|| ApiResponse::empty(500))
            }
        })
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Requests with the given method whose URL ends with `suffix`.
    pub fn calls_to(&self, method: Method, suffix: &str) -> Vec<ApiRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .collect()
    }
}

impl Requester for MockRequester {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let response = {
            let mut handler = self.handler.lock().unwrap_or_else(PoisonError::into_inner);
            (handler)(request)
        };
        Box::pin(async move { Ok(response) })
    }
}
