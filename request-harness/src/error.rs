/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Errors raised by the harness.
//!
//! There are two distinct kinds of failure:
//! - [`UsageError`]: the test (or the client under test) drove a request or batch through an
//!   operation it is not allowed to perform in its current state. These are returned as `Err`.
//! - [`SendFailure`]: a simulated network failure. These are never returned as `Err`; they are
//!   captured on the request as part of its [`Outcome`](crate::request::Outcome).

use std::fmt;
use thiserror::Error;

/// An operation was invoked outside of its permitted state, or with an unusable argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The request or batch has (or has not yet) been sent.
    #[error("out of sequence: {0}")]
    OutOfSequence(String),
    /// A batch was handed a request implementation it cannot drive.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl UsageError {
    pub(crate) fn out_of_sequence(message: impl Into<String>) -> Self {
        UsageError::OutOfSequence(message.into())
    }

    pub(crate) fn already_sent(operation: &str) -> Self {
        Self::out_of_sequence(format!(
            "Request has already been sent cannot {operation}"
        ))
    }

    pub(crate) fn not_sent(operation: &str) -> Self {
        Self::out_of_sequence(format!("Request has not been sent yet. Cannot {operation}"))
    }
}

/// Reading the status code of a sent request failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// The request was not in a state to be read.
    #[error(transparent)]
    Usage(#[from] UsageError),
    /// The canned response headers do not start with a valid HTTP status line.
    #[error("bad response: {0}")]
    BadResponse(String),
}

/// A request attribute checked by a fixture after the fixture has been selected.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestAttribute {
    Url,
    Headers,
    Cookies,
    Method,
    PostBody,
    CaCert,
}

impl RequestAttribute {
    /// All validated attributes, in the order they are checked.
    pub const VALIDATION_ORDER: [RequestAttribute; 6] = [
        RequestAttribute::Url,
        RequestAttribute::Headers,
        RequestAttribute::Cookies,
        RequestAttribute::Method,
        RequestAttribute::PostBody,
        RequestAttribute::CaCert,
    ];
}

impl fmt::Display for RequestAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestAttribute::Url => "url",
            RequestAttribute::Headers => "headers",
            RequestAttribute::Cookies => "cookies",
            RequestAttribute::Method => "GET/POST type",
            RequestAttribute::PostBody => "POST body",
            RequestAttribute::CaCert => "CA cert",
        };
        f.write_str(name)
    }
}

/// A simulated request failure.
///
/// The `Display` output is the error message stored on the failed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    /// No registered fixture selected the requested URL.
    #[error("404 URL {url} not found in test harness.")]
    NotFound { url: String },
    /// A fixture selected the URL but rejected one of the request's attributes.
    #[error("Validation of {0} failed.")]
    Validation(RequestAttribute),
}
