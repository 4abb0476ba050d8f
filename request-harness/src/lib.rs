/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A deterministic stand-in for the HTTP requests made by a CAS client.
//!
//! Tests register [`ResponseFixture`]s (an expected request plus a canned response) in a
//! [`FixtureRegistry`], then hand the client [`RequestStub`]s or [`BatchStub`]s bound to that
//! registry in place of real network requests. Sending a stub matches it against the registry:
//! - the first fixture whose URL matcher selects the request validates its url, headers,
//!   cookies, method, POST body and CA certificate, in that order;
//! - if every validator accepts, the stub captures the fixture's response headers and body;
//! - otherwise the stub captures a failure naming the first rejected attribute, or a 404 if no
//!   fixture selected the URL.
//!
//! Simulated failures are captured on the stub and never returned as errors. Misuse of the
//! request protocol (sending twice, configuring a sent request, sending an empty batch) is a
//! [`UsageError`].

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod batch;
pub mod error;
pub mod fixture;
pub mod registry;
pub mod request;
pub mod stub;

#[cfg(feature = "test-util")]
pub mod test_util;

pub use batch::BatchStub;
pub use error::{RequestAttribute, ResponseError, SendFailure, UsageError};
pub use fixture::{ResponseFixture, StaticFixture};
pub use registry::FixtureRegistry;
pub use request::{HttpRequest, MultiRequest, Outcome};
pub use stub::RequestStub;
