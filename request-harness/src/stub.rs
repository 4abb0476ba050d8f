/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::{RequestAttribute, SendFailure, UsageError};
use crate::fixture::ResponseFixture;
use crate::registry::FixtureRegistry;
use crate::request::{HttpRequest, Outcome, RequestState};
use std::any::Any;

/// A simulated request answered from a [`FixtureRegistry`].
///
/// Configure the stub through [`HttpRequest`], then [`send`](HttpRequest::send) it exactly once.
/// The registry is consulted at send time, so fixtures registered after the stub was created
/// are still considered.
///
/// # Examples
/// ```rust
/// use request_harness::fixture::StaticFixture;
/// use request_harness::{FixtureRegistry, HttpRequest, RequestStub};
///
/// let registry = FixtureRegistry::new();
/// registry.add_response(
///     StaticFixture::builder("https://sso.example/cas")
///         .expect_post(true)
///         .expect_post_body("ticket=abc")
///         .respond_headers(["Content-Type: text/xml"])
///         .respond_body("<ok/>")
///         .build(),
/// );
///
/// let mut request = RequestStub::new(&registry);
/// request.set_url("https://sso.example/cas").unwrap();
/// request.make_post().unwrap();
/// request.set_post_body("ticket=abc").unwrap();
/// assert!(request.send().unwrap());
/// assert_eq!("<ok/>", request.response_body().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct RequestStub {
    registry: FixtureRegistry,
    state: RequestState,
}

impl RequestStub {
    pub fn new(registry: &FixtureRegistry) -> Self {
        Self {
            registry: registry.clone(),
            state: RequestState::new(),
        }
    }

    /// Creates a stub for `url`.
    pub fn with_url(registry: &FixtureRegistry, url: impl Into<String>) -> Self {
        Self {
            registry: registry.clone(),
            state: RequestState::with_url(url),
        }
    }

    /// The captured outcome, `None` until the stub has been sent.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.state.outcome()
    }
}

/// Matches `request` against `registry`. The first fixture whose URL matcher selects the request
/// decides the outcome.
fn resolve(registry: &FixtureRegistry, request: &RequestState) -> Outcome {
    let url = request.url();
    for (index, fixture) in registry.fixtures().iter().enumerate() {
        if !fixture.matches_url(url) {
            continue;
        }
        tracing::debug!(url, index, "response fixture selected");
        // A selected fixture decides the outcome even if it rejects the request
        return match first_rejected(&**fixture, request) {
            Some(attribute) => {
                tracing::debug!(url, index, %attribute, "request rejected by fixture");
                Outcome::Failure(SendFailure::Validation(attribute))
            }
            None => Outcome::Success {
                headers: fixture.response_headers().to_vec(),
                body: fixture.response_body().to_owned(),
            },
        };
    }
    tracing::debug!(url, "no response fixture matched");
    Outcome::Failure(SendFailure::NotFound {
        url: url.to_owned(),
    })
}

/// Runs the fixture's validators in order and returns the first attribute it rejects.
fn first_rejected(
    fixture: &dyn ResponseFixture,
    request: &RequestState,
) -> Option<RequestAttribute> {
    RequestAttribute::VALIDATION_ORDER
        .into_iter()
        .find(|attribute| {
            let accepted = match attribute {
                RequestAttribute::Url => fixture.validate_url(request.url()),
                RequestAttribute::Headers => fixture.validate_headers(request.headers()),
                RequestAttribute::Cookies => fixture.validate_cookies(request.cookies()),
                RequestAttribute::Method => fixture.validate_is_post(request.is_post()),
                RequestAttribute::PostBody => fixture.validate_post_body(request.post_body()),
                RequestAttribute::CaCert => fixture.validate_ca_cert(request.ca_cert_path()),
            };
            tracing::trace!(%attribute, accepted, "validated request attribute");
            !accepted
        })
}

impl HttpRequest for RequestStub {
    fn state(&self) -> &RequestState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RequestState {
        &mut self.state
    }

    fn send(&mut self) -> Result<bool, UsageError> {
        let registry = &self.registry;
        self.state
            .complete_send(|request| resolve(registry, request))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Cookies, Expect, StaticFixture, UrlMatcher};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    const CAS_URL: &str = "https://sso.example/cas";

    fn cas_registry() -> FixtureRegistry {
        let registry = FixtureRegistry::new();
        registry.add_response(
            StaticFixture::builder(CAS_URL)
                .expect_post(true)
                .expect_post_body("ticket=abc")
                .respond_headers(["Content-Type: text/xml"])
                .respond_body("<ok/>")
                .build(),
        );
        registry
    }

    fn post(registry: &FixtureRegistry, url: &str, body: &str) -> RequestStub {
        let mut request = RequestStub::with_url(registry, url);
        request.make_post().unwrap();
        request.set_post_body(body).unwrap();
        request
    }

    #[test]
    fn matching_request_captures_canned_response() {
        let registry = cas_registry();
        let mut request = post(&registry, CAS_URL, "ticket=abc");

        assert!(request.send().unwrap());
        assert!(request.is_sent());
        assert_eq!(
            Some(&Outcome::Success {
                headers: vec!["Content-Type: text/xml".into()],
                body: "<ok/>".into(),
            }),
            request.outcome()
        );
        assert_eq!(None, request.error_message().unwrap());
    }

    #[test]
    fn wrong_method_fails_validation() {
        let registry = cas_registry();
        let mut request = RequestStub::with_url(&registry, CAS_URL);

        assert!(!request.send().unwrap());
        assert_eq!(
            Some("Validation of GET/POST type failed.".to_string()),
            request.error_message().unwrap()
        );
        assert_eq!("", request.response_body().unwrap());
    }

    #[test]
    fn unknown_url_is_not_found() {
        let registry = cas_registry();
        let mut request = post(&registry, "https://sso.example/other", "ticket=abc");

        assert!(!request.send().unwrap());
        assert_eq!(
            Some("404 URL https://sso.example/other not found in test harness.".to_string()),
            request.error_message().unwrap()
        );
    }

    #[test]
    fn second_send_is_out_of_sequence() {
        let registry = cas_registry();
        let mut ok = post(&registry, CAS_URL, "ticket=abc");
        let mut failed = RequestStub::with_url(&registry, "https://nowhere.example/");
        ok.send().unwrap();
        failed.send().unwrap();

        assert!(matches!(ok.send(), Err(UsageError::OutOfSequence(_))));
        assert!(matches!(failed.send(), Err(UsageError::OutOfSequence(_))));
        assert!(ok.outcome().unwrap().is_success());
    }

    #[test]
    fn outcome_is_fixed_once_sent() {
        let registry = cas_registry();
        let mut request = RequestStub::with_url(&registry, "https://nowhere.example/");
        request.send().unwrap();

        let forged = request.state_mut().complete_send(|_| Outcome::Success {
            headers: vec![],
            body: "forged".into(),
        });
        assert!(matches!(forged, Err(UsageError::OutOfSequence(_))));
        assert_eq!("", request.response_body().unwrap());
        assert_eq!(
            Some("404 URL https://nowhere.example/ not found in test harness.".to_string()),
            request.error_message().unwrap()
        );
    }

    #[test]
    fn outcome_is_only_set_by_sending() {
        let registry = cas_registry();
        let mut request = post(&registry, CAS_URL, "ticket=abc");
        {
            let state = request.state_mut();
            assert!(!state.is_sent());
            assert_eq!(None, state.outcome());
        }
        assert!(request.send().unwrap());
        assert_eq!("<ok/>", request.response_body().unwrap());
    }

    #[test]
    fn panicking_fixture_still_consumes_the_request() {
        let registry = FixtureRegistry::new();
        registry.add_response(
            StaticFixture::builder(CAS_URL)
                .expect_post_body_with(Expect::satisfies(|_: &str| -> bool {
                    panic!("fixture predicate failed")
                }))
                .build(),
        );
        let mut request = RequestStub::with_url(&registry, CAS_URL);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| request.send()));
        assert!(result.is_err());
        assert!(request.is_sent());
        assert_eq!(None, request.outcome());
        assert!(matches!(request.send(), Err(UsageError::OutOfSequence(_))));
    }

    #[test]
    fn first_registered_fixture_wins() {
        let registry = FixtureRegistry::new();
        registry.add_response(
            StaticFixture::builder(UrlMatcher::prefix("https://sso.example/"))
                .expect_post(true)
                .build(),
        );
        registry.add_response(
            StaticFixture::builder(CAS_URL)
                .respond_body("second")
                .build(),
        );

        // The first fixture selects the URL and rejects the GET; the second is never consulted.
        let mut request = RequestStub::with_url(&registry, CAS_URL);
        assert!(!request.send().unwrap());
        assert_eq!(
            Some(&Outcome::Failure(SendFailure::Validation(
                RequestAttribute::Method
            ))),
            request.outcome()
        );
    }

    #[test]
    fn validators_run_in_order_and_stop_at_first_rejection() {
        #[derive(Debug)]
        struct Recording {
            calls: Arc<AtomicUsize>,
            reject: RequestAttribute,
        }

        impl Recording {
            fn check(&self, attribute: RequestAttribute) -> bool {
                let position = RequestAttribute::VALIDATION_ORDER
                    .iter()
                    .position(|a| *a == attribute)
                    .unwrap();
                assert_eq!(position, self.calls.fetch_add(1, Ordering::SeqCst));
                attribute != self.reject
            }
        }

        impl ResponseFixture for Recording {
            fn matches_url(&self, _url: &str) -> bool {
                true
            }
            fn validate_url(&self, _url: &str) -> bool {
                self.check(RequestAttribute::Url)
            }
            fn validate_headers(&self, _headers: &[String]) -> bool {
                self.check(RequestAttribute::Headers)
            }
            fn validate_cookies(&self, _cookies: &Cookies) -> bool {
                self.check(RequestAttribute::Cookies)
            }
            fn validate_is_post(&self, _is_post: bool) -> bool {
                self.check(RequestAttribute::Method)
            }
            fn validate_post_body(&self, _body: &str) -> bool {
                self.check(RequestAttribute::PostBody)
            }
            fn validate_ca_cert(&self, _ca_cert_path: Option<&str>) -> bool {
                self.check(RequestAttribute::CaCert)
            }
            fn response_headers(&self) -> &[String] {
                &[]
            }
            fn response_body(&self) -> &str {
                ""
            }
        }

        for (expected_calls, reject) in RequestAttribute::VALIDATION_ORDER.into_iter().enumerate() {
            let calls = Arc::new(AtomicUsize::new(0));
            let registry = FixtureRegistry::new();
            registry.add_response(Recording {
                calls: calls.clone(),
                reject,
            });
            let mut request = RequestStub::with_url(&registry, CAS_URL);
            assert!(!request.send().unwrap());
            assert_eq!(
                Some(format!("Validation of {reject} failed.")),
                request.error_message().unwrap()
            );
            assert_eq!(expected_calls + 1, calls.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn every_attribute_is_validated() {
        let registry = FixtureRegistry::new();
        registry.add_response(
            StaticFixture::builder(CAS_URL)
                .expect_url(Expect::equals(CAS_URL))
                .require_header("Accept", "text/xml")
                .expect_cookies(Expect::satisfies(|cookies: &Cookies| {
                    cookies.contains_key("TGC")
                }))
                .expect_post(false)
                .expect_post_body("")
                .expect_ca_cert(Some("/etc/ssl/cas.pem"))
                .respond_headers(["HTTP/1.1 200 OK"])
                .build(),
        );

        let mut request = RequestStub::with_url(&registry, CAS_URL);
        request.add_header("Accept: text/xml").unwrap();
        request.add_cookie("TGC", "TGT-1").unwrap();
        request.set_ssl_ca_cert("/etc/ssl/cas.pem").unwrap();
        assert!(request.send().unwrap());
        assert_eq!(http::StatusCode::OK, request.response_status_code().unwrap());

        let mut missing_cert = RequestStub::with_url(&registry, CAS_URL);
        missing_cert.add_header("Accept: text/xml").unwrap();
        missing_cert.add_cookie("TGC", "TGT-1").unwrap();
        assert!(!missing_cert.send().unwrap());
        assert_eq!(
            Some("Validation of CA cert failed.".to_string()),
            missing_cert.error_message().unwrap()
        );

        let mut missing_header = RequestStub::with_url(&registry, CAS_URL);
        assert!(!missing_header.send().unwrap());
        assert_eq!(
            Some("Validation of headers failed.".to_string()),
            missing_header.error_message().unwrap()
        );
    }

    #[test]
    fn fixtures_registered_after_construction_are_used() {
        let registry = FixtureRegistry::new();
        let mut request = RequestStub::with_url(&registry, CAS_URL);
        registry.add_response(StaticFixture::builder(CAS_URL).respond_body("late").build());
        assert!(request.send().unwrap());
        assert_eq!("late", request.response_body().unwrap());
    }

    #[test]
    fn cleared_registry_always_returns_not_found() {
        let registry = cas_registry();
        registry.add_response(StaticFixture::builder("https://sso.example/logout").build());
        registry.clear_responses();

        for url in [CAS_URL, "https://sso.example/logout"] {
            let mut request = post(&registry, url, "ticket=abc");
            assert!(!request.send().unwrap());
            assert_eq!(
                Some(&Outcome::Failure(SendFailure::NotFound { url: url.into() })),
                request.outcome()
            );
        }
    }

    #[test]
    #[traced_test]
    fn logs_selection_and_rejection() {
        let registry = cas_registry();
        let mut request = RequestStub::with_url(&registry, CAS_URL);
        request.send().unwrap();
        assert!(logs_contain("response fixture selected"));
        assert!(logs_contain("request rejected by fixture"));

        let mut missing = RequestStub::with_url(&registry, "https://nowhere.example/");
        missing.send().unwrap();
        assert!(logs_contain("no response fixture matched"));
    }
}
