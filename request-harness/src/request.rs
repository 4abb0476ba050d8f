/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The request contract consumed by the CAS client.
//!
//! [`HttpRequest`] is what client code programs against: configure a request, send it once,
//! then read the response. [`MultiRequest`] is the equivalent contract for a batch of requests.
//! The harness implements both ([`RequestStub`](crate::stub::RequestStub) and
//! [`BatchStub`](crate::batch::BatchStub)) so that swapping it in for a real transport is
//! invisible to the client.
//!
//! Every implementation carries a [`RequestState`], which enforces the configure-then-send
//! ordering shared by all requests: configuration is rejected once a request has been sent, and
//! response accessors are rejected until it has been.

use crate::error::{ResponseError, SendFailure, UsageError};
use crate::fixture::Cookies;
use http::StatusCode;
use std::any::Any;
use std::fmt;

/// The captured result of sending a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A fixture accepted the request; these are its canned header lines and body.
    Success { headers: Vec<String>, body: String },
    /// The simulated request failed.
    Failure(SendFailure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// The attributes and captured outcome of a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    url: String,
    headers: Vec<String>,
    cookies: Cookies,
    is_post: bool,
    post_body: String,
    ca_cert_path: Option<String>,
    sent: bool,
    outcome: Option<Outcome>,
}

impl RequestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn is_post(&self) -> bool {
        self.is_post
    }

    pub fn post_body(&self) -> &str {
        &self.post_body
    }

    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert_path.as_deref()
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// `None` until the request has been sent.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    fn ensure_unsent(&self, operation: &str) -> Result<(), UsageError> {
        if self.sent {
            return Err(UsageError::already_sent(operation));
        }
        Ok(())
    }

    fn sent_outcome(&self, operation: &str) -> Result<Option<&Outcome>, UsageError> {
        if !self.sent {
            return Err(UsageError::not_sent(operation));
        }
        Ok(self.outcome.as_ref())
    }

    pub fn set_url(&mut self, url: impl Into<String>) -> Result<(), UsageError> {
        self.ensure_unsent("set_url()")?;
        self.url = url.into();
        Ok(())
    }

    /// Adds a raw header line, e.g. `Accept: text/xml`.
    pub fn add_header(&mut self, header: impl Into<String>) -> Result<(), UsageError> {
        self.ensure_unsent("add_header()")?;
        self.headers.push(header.into());
        Ok(())
    }

    pub fn add_headers<I, S>(&mut self, headers: I) -> Result<(), UsageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_unsent("add_headers()")?;
        self.headers.extend(headers.into_iter().map(Into::into));
        Ok(())
    }

    /// Adds a cookie, replacing any earlier cookie of the same name.
    pub fn add_cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), UsageError> {
        self.ensure_unsent("add_cookie()")?;
        self.cookies.insert(name.into(), value.into());
        Ok(())
    }

    pub fn add_cookies<I, K, V>(&mut self, cookies: I) -> Result<(), UsageError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_unsent("add_cookies()")?;
        self.cookies
            .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        Ok(())
    }

    pub fn make_post(&mut self) -> Result<(), UsageError> {
        self.ensure_unsent("make_post()")?;
        self.is_post = true;
        Ok(())
    }

    /// Sets the POST body. [`make_post`](Self::make_post) must be called first.
    pub fn set_post_body(&mut self, body: impl Into<String>) -> Result<(), UsageError> {
        self.ensure_unsent("set_post_body()")?;
        if !self.is_post {
            return Err(UsageError::out_of_sequence(
                "Cannot add a POST body to a GET request, use make_post() first.",
            ));
        }
        self.post_body = body.into();
        Ok(())
    }

    pub fn set_ssl_ca_cert(&mut self, ca_cert_path: impl Into<String>) -> Result<(), UsageError> {
        self.ensure_unsent("set_ssl_ca_cert()")?;
        self.ca_cert_path = Some(ca_cert_path.into());
        Ok(())
    }

    /// Sends the request: the only transition from unsent to sent.
    ///
    /// The request is marked sent before `resolve` runs, so it stays consumed even if `resolve`
    /// panics. The outcome `resolve` returns is stored and can never be replaced. Returns whether
    /// the outcome is a success, or [`UsageError::OutOfSequence`] if the request was already sent.
    pub fn complete_send(
        &mut self,
        resolve: impl FnOnce(&RequestState) -> Outcome,
    ) -> Result<bool, UsageError> {
        self.ensure_unsent("send again.")?;
        self.sent = true;
        let outcome = resolve(self);
        let success = outcome.is_success();
        self.outcome = Some(outcome);
        Ok(success)
    }

    /// Response header lines. Empty if the request failed.
    pub fn response_headers(&self) -> Result<&[String], UsageError> {
        match self.sent_outcome("get the response headers.")? {
            Some(Outcome::Success { headers, .. }) => Ok(headers),
            _ => Ok(&[]),
        }
    }

    /// Response body. Empty if the request failed.
    pub fn response_body(&self) -> Result<&str, UsageError> {
        match self.sent_outcome("get the response body.")? {
            Some(Outcome::Success { body, .. }) => Ok(body),
            _ => Ok(""),
        }
    }

    /// Parses the status code from the status line (the first response header line).
    pub fn response_status_code(&self) -> Result<StatusCode, ResponseError> {
        let headers = self.response_headers()?;
        let status_line = headers.first().ok_or_else(|| {
            ResponseError::BadResponse("no status line was returned.".into())
        })?;
        parse_status_line(status_line)
    }

    /// The failure message, or `None` if the request succeeded.
    pub fn error_message(&self) -> Result<Option<String>, UsageError> {
        match self.sent_outcome("get the error message.")? {
            Some(Outcome::Failure(failure)) => Ok(Some(failure.to_string())),
            _ => Ok(None),
        }
    }
}

fn parse_status_line(line: &str) -> Result<StatusCode, ResponseError> {
    let bad_status = || {
        ResponseError::BadResponse(format!(
            "no status code was found in the first line: `{line}`"
        ))
    };
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => {
            StatusCode::from_bytes(code.as_bytes()).map_err(|_| bad_status())
        }
        _ => Err(bad_status()),
    }
}

/// A request that can be configured, sent once, and then inspected.
///
/// Implementors supply [`state`](Self::state), [`state_mut`](Self::state_mut) and
/// [`send`](Self::send); configuration and response accessors are provided on top of the
/// [`RequestState`].
pub trait HttpRequest: Any + fmt::Debug {
    fn state(&self) -> &RequestState;

    fn state_mut(&mut self) -> &mut RequestState;

    /// Performs the request and stores its outcome.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` if the simulated request failed; the
    /// failure is available from [`error_message`](Self::error_message). Sending a request
    /// more than once is a [`UsageError::OutOfSequence`].
    fn send(&mut self) -> Result<bool, UsageError>;

    /// Converts the request into `Any` so batches can recover the concrete type.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn is_sent(&self) -> bool {
        self.state().is_sent()
    }

    fn set_url(&mut self, url: &str) -> Result<(), UsageError> {
        self.state_mut().set_url(url)
    }

    fn add_header(&mut self, header: &str) -> Result<(), UsageError> {
        self.state_mut().add_header(header)
    }

    fn add_headers(&mut self, headers: &[&str]) -> Result<(), UsageError> {
        self.state_mut().add_headers(headers.iter().copied())
    }

    fn add_cookie(&mut self, name: &str, value: &str) -> Result<(), UsageError> {
        self.state_mut().add_cookie(name, value)
    }

    fn add_cookies(&mut self, cookies: &[(&str, &str)]) -> Result<(), UsageError> {
        self.state_mut().add_cookies(cookies.iter().copied())
    }

    fn make_post(&mut self) -> Result<(), UsageError> {
        self.state_mut().make_post()
    }

    fn set_post_body(&mut self, body: &str) -> Result<(), UsageError> {
        self.state_mut().set_post_body(body)
    }

    fn set_ssl_ca_cert(&mut self, ca_cert_path: &str) -> Result<(), UsageError> {
        self.state_mut().set_ssl_ca_cert(ca_cert_path)
    }

    fn response_headers(&self) -> Result<&[String], UsageError> {
        self.state().response_headers()
    }

    fn response_status_code(&self) -> Result<StatusCode, ResponseError> {
        self.state().response_status_code()
    }

    fn response_body(&self) -> Result<&str, UsageError> {
        self.state().response_body()
    }

    fn error_message(&self) -> Result<Option<String>, UsageError> {
        self.state().error_message()
    }
}

/// A batch of requests sent together.
///
/// Implementations may restrict which request implementations they accept.
pub trait MultiRequest {
    /// Adds a request of any implementation to the batch.
    ///
    /// Fails with [`UsageError::OutOfSequence`] once the batch has been sent and with
    /// [`UsageError::InvalidArgument`] if this batch cannot drive `request`'s implementation.
    fn add_boxed_request(&mut self, request: Box<dyn HttpRequest>) -> Result<(), UsageError>;

    /// Sends every request in the batch. After this returns, each request has its outcome.
    fn send(&mut self) -> Result<(), UsageError>;

    /// The number of requests added so far. Not available once the batch has been sent.
    fn num_requests(&self) -> Result<usize, UsageError>;
}
