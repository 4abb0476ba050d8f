/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::UsageError;
use crate::registry::FixtureRegistry;
use crate::request::{HttpRequest, MultiRequest};
use crate::stub::RequestStub;

/// A batch of [`RequestStub`]s sent as one operation.
///
/// Requests are sent one after another in the order they were added; each runs to completion
/// before the next starts. A failing request does not stop the batch and the batch reports no
/// aggregate result: inspect each request's outcome after sending.
///
/// # Examples
/// ```rust
/// use request_harness::fixture::StaticFixture;
/// use request_harness::{BatchStub, FixtureRegistry, HttpRequest, RequestStub};
///
/// let registry = FixtureRegistry::new();
/// registry.add_response(StaticFixture::builder("https://sso.example/a").respond_body("a").build());
///
/// let mut batch = BatchStub::new();
/// batch.add_request(RequestStub::with_url(&registry, "https://sso.example/a")).unwrap();
/// batch.add_request(RequestStub::with_url(&registry, "https://sso.example/b")).unwrap();
/// batch.send().unwrap();
///
/// let [a, b] = batch.requests() else { unreachable!() };
/// assert_eq!("a", a.response_body().unwrap());
/// assert!(b.error_message().unwrap().unwrap().starts_with("404"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchStub {
    requests: Vec<RequestStub>,
    sent: bool,
}

impl BatchStub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch of unsent stubs, one per URL, all answered from `registry`.
    pub fn for_urls<I, S>(registry: &FixtureRegistry, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            requests: urls
                .into_iter()
                .map(|url| RequestStub::with_url(registry, url))
                .collect(),
            sent: false,
        }
    }

    /// Adds a request to the batch.
    ///
    /// Fails if the batch has already been sent, or if `request` itself has already been sent
    /// (it could not be sent again as part of this batch).
    pub fn add_request(&mut self, request: RequestStub) -> Result<(), UsageError> {
        if self.sent {
            return Err(UsageError::already_sent("add_request()"));
        }
        if request.is_sent() {
            return Err(UsageError::out_of_sequence(
                "Requests added to a multi-request must not have been sent individually.",
            ));
        }
        self.requests.push(request);
        Ok(())
    }

    /// Sends every request in insertion order.
    pub fn send(&mut self) -> Result<(), UsageError> {
        if self.sent {
            return Err(UsageError::already_sent("send again."));
        }
        if self.requests.is_empty() {
            return Err(UsageError::out_of_sequence(
                "At least one request must be added via add_request() before the multi-request can be sent.",
            ));
        }
        self.sent = true;
        tracing::debug!(count = self.requests.len(), "sending multi-request");
        for (index, request) in self.requests.iter_mut().enumerate() {
            // Members are checked unsent on insertion, so only the simulated outcome varies
            let success = request.send()?;
            tracing::trace!(index, success, "multi-request member sent");
        }
        Ok(())
    }

    /// The number of requests added so far. Not available once the batch has been sent.
    pub fn num_requests(&self) -> Result<usize, UsageError> {
        if self.sent {
            return Err(UsageError::already_sent("num_requests()"));
        }
        Ok(self.requests.len())
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// The requests in insertion order, for inspecting their outcomes.
    pub fn requests(&self) -> &[RequestStub] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<RequestStub> {
        self.requests
    }
}

impl MultiRequest for BatchStub {
    fn add_boxed_request(&mut self, request: Box<dyn HttpRequest>) -> Result<(), UsageError> {
        if self.sent {
            return Err(UsageError::already_sent("add_boxed_request()"));
        }
        let request = request.into_any().downcast::<RequestStub>().map_err(|_| {
            UsageError::InvalidArgument(
                "As a BatchStub, I can only work with RequestStub objects.".into(),
            )
        })?;
        self.add_request(*request)
    }

    fn send(&mut self) -> Result<(), UsageError> {
        BatchStub::send(self)
    }

    fn num_requests(&self) -> Result<usize, UsageError> {
        BatchStub::num_requests(self)
    }
}
