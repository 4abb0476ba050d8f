/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Response fixtures: an expected request paired with a canned reply.
//!
//! A fixture is consulted in two phases. [`ResponseFixture::matches_url`] selects the fixture
//! for a request; once selected, the `validate_*` methods check every other attribute of the
//! request. Keeping selection separate from validation means a request with the right URL but
//! the wrong method, body or headers fails with a message naming the rejected attribute instead
//! of a generic 404.

use http::HeaderName;
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Cookies sent with a request, keyed by cookie name.
pub type Cookies = BTreeMap<String, String>;

/// An expected request and the response the harness returns for it.
///
/// Implementations must be pure: every method is a function of the fixture's own state and its
/// arguments. Fixtures are immutable once registered.
pub trait ResponseFixture: fmt::Debug + Send + Sync {
    /// Returns `true` if this fixture should handle a request to `url`.
    fn matches_url(&self, url: &str) -> bool;

    /// Validates the URL of a request this fixture was selected for.
    fn validate_url(&self, _url: &str) -> bool {
        true
    }

    /// Validates the raw header lines (`Name: value`) of the request.
    fn validate_headers(&self, headers: &[String]) -> bool;

    /// Validates the cookies of the request.
    fn validate_cookies(&self, cookies: &Cookies) -> bool;

    /// Validates whether the request is a POST (`true`) or a GET (`false`).
    fn validate_is_post(&self, is_post: bool) -> bool;

    /// Validates the POST body. GET requests have an empty body.
    fn validate_post_body(&self, body: &str) -> bool;

    /// Validates the CA certificate path the request would verify the server with.
    fn validate_ca_cert(&self, ca_cert_path: Option<&str>) -> bool;

    /// Response header lines returned when every validator passes.
    fn response_headers(&self) -> &[String];

    /// Response body returned when every validator passes.
    fn response_body(&self) -> &str;
}

/// A reference-counted [`ResponseFixture`] as stored in a [`FixtureRegistry`](crate::registry::FixtureRegistry).
#[derive(Debug, Clone)]
pub struct SharedFixture(Arc<dyn ResponseFixture>);

impl SharedFixture {
    pub fn new(fixture: impl ResponseFixture + 'static) -> Self {
        Self(Arc::new(fixture))
    }
}

impl<F> From<F> for SharedFixture
where
    F: ResponseFixture + 'static,
{
    fn from(fixture: F) -> Self {
        Self::new(fixture)
    }
}

impl Deref for SharedFixture {
    type Target = dyn ResponseFixture;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Selects a fixture for a request URL.
#[derive(Debug, Clone)]
pub enum UrlMatcher {
    /// The URL must equal this string exactly.
    Exact(String),
    /// The URL must start with this string.
    Prefix(String),
    /// The URL must match this regular expression somewhere.
    Pattern(Regex),
}

impl UrlMatcher {
    pub fn exact(url: impl Into<String>) -> Self {
        UrlMatcher::Exact(url.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        UrlMatcher::Prefix(prefix.into())
    }

    /// Builds a matcher from a regular expression. Anchor it (`^...$`) to match the whole URL.
    pub fn pattern(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(UrlMatcher::Pattern(Regex::new(pattern)?))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlMatcher::Exact(expected) => expected == url,
            UrlMatcher::Prefix(prefix) => url.starts_with(prefix.as_str()),
            UrlMatcher::Pattern(regex) => regex.is_match(url),
        }
    }
}

impl From<&str> for UrlMatcher {
    fn from(url: &str) -> Self {
        UrlMatcher::exact(url)
    }
}

impl From<String> for UrlMatcher {
    fn from(url: String) -> Self {
        UrlMatcher::Exact(url)
    }
}

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// An expectation on one attribute of a request.
pub enum Expect<T>
where
    T: ?Sized + ToOwned,
{
    /// Accept any value.
    Any,
    /// Accept only this value.
    Equals(T::Owned),
    /// Accept values for which the predicate returns `true`.
    Satisfies(Predicate<T>),
}

impl<T> Expect<T>
where
    T: ?Sized + ToOwned + PartialEq<T::Owned>,
{
    pub fn equals(value: impl Into<T::Owned>) -> Self {
        Expect::Equals(value.into())
    }

    pub fn satisfies(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Expect::Satisfies(Arc::new(predicate))
    }

    /// Returns `true` if `actual` meets this expectation.
    pub fn check(&self, actual: &T) -> bool {
        match self {
            Expect::Any => true,
            Expect::Equals(expected) => actual == expected,
            Expect::Satisfies(predicate) => predicate(actual),
        }
    }
}

impl<T> Default for Expect<T>
where
    T: ?Sized + ToOwned,
{
    fn default() -> Self {
        Expect::Any
    }
}

impl<T> Clone for Expect<T>
where
    T: ?Sized + ToOwned,
    T::Owned: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Expect::Any => Expect::Any,
            Expect::Equals(expected) => Expect::Equals(expected.clone()),
            Expect::Satisfies(predicate) => Expect::Satisfies(predicate.clone()),
        }
    }
}

impl<T> fmt::Debug for Expect<T>
where
    T: ?Sized + ToOwned,
    T::Owned: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Any => write!(f, "Any"),
            Expect::Equals(expected) => f.debug_tuple("Equals").field(expected).finish(),
            Expect::Satisfies(_) => write!(f, "Satisfies(<predicate>)"),
        }
    }
}

/// Splits a raw `Name: value` header line into a normalized name and trimmed value.
pub(crate) fn parse_header_line(line: &str) -> Option<(HeaderName, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).ok()?;
    Some((name, value.trim()))
}

/// A [`ResponseFixture`] built from static expectations.
///
/// # Examples
/// ```rust
/// use request_harness::fixture::StaticFixture;
///
/// let fixture = StaticFixture::builder("https://sso.example/cas/serviceValidate")
///     .expect_post(true)
///     .expect_post_body("ticket=ST-1")
///     .respond_headers(["HTTP/1.1 200 OK", "Content-Type: text/xml"])
///     .respond_body("<cas:serviceResponse/>")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct StaticFixture {
    url_matcher: UrlMatcher,
    url: Expect<str>,
    headers: Expect<[String]>,
    required_headers: Vec<(String, String)>,
    cookies: Expect<Cookies>,
    is_post: Expect<bool>,
    post_body: Expect<str>,
    ca_cert: Expect<Option<String>>,
    response_headers: Vec<String>,
    response_body: String,
}

impl StaticFixture {
    /// Starts a fixture selected by `url_matcher`. A plain string selects by exact URL.
    pub fn builder(url_matcher: impl Into<UrlMatcher>) -> StaticFixtureBuilder {
        StaticFixtureBuilder {
            inner: StaticFixture {
                url_matcher: url_matcher.into(),
                url: Expect::Any,
                headers: Expect::Any,
                required_headers: Vec::new(),
                cookies: Expect::Any,
                is_post: Expect::Any,
                post_body: Expect::Any,
                ca_cert: Expect::Any,
                response_headers: Vec::new(),
                response_body: String::new(),
            },
        }
    }

    fn has_required_headers(&self, headers: &[String]) -> bool {
        self.required_headers.iter().all(|(name, value)| {
            headers
                .iter()
                .filter_map(|line| parse_header_line(line))
                .any(|(actual_name, actual_value)| {
                    actual_name.as_str() == name && actual_value == value
                })
        })
    }
}

impl ResponseFixture for StaticFixture {
    fn matches_url(&self, url: &str) -> bool {
        self.url_matcher.matches(url)
    }

    fn validate_url(&self, url: &str) -> bool {
        self.url.check(url)
    }

    fn validate_headers(&self, headers: &[String]) -> bool {
        self.headers.check(headers) && self.has_required_headers(headers)
    }

    fn validate_cookies(&self, cookies: &Cookies) -> bool {
        self.cookies.check(cookies)
    }

    fn validate_is_post(&self, is_post: bool) -> bool {
        self.is_post.check(&is_post)
    }

    fn validate_post_body(&self, body: &str) -> bool {
        self.post_body.check(body)
    }

    fn validate_ca_cert(&self, ca_cert_path: Option<&str>) -> bool {
        self.ca_cert.check(&ca_cert_path.map(str::to_owned))
    }

    fn response_headers(&self) -> &[String] {
        &self.response_headers
    }

    fn response_body(&self) -> &str {
        &self.response_body
    }
}

/// Builder for [`StaticFixture`]. Every expectation defaults to accepting anything.
#[derive(Debug, Clone)]
pub struct StaticFixtureBuilder {
    inner: StaticFixture,
}

impl StaticFixtureBuilder {
    /// Validates the URL of a selected request, e.g. to check query parameters of a prefix match.
    pub fn expect_url(mut self, expect: Expect<str>) -> Self {
        self.inner.url = expect;
        self
    }

    /// Sets the expectation on the full list of request header lines.
    pub fn expect_headers(mut self, expect: Expect<[String]>) -> Self {
        self.inner.headers = expect;
        self
    }

    /// Requires a header named `name` (case-insensitive) with exactly `value`.
    ///
    /// May be called repeatedly; every required header must be present. This is checked in
    /// addition to [`expect_headers`](Self::expect_headers).
    pub fn require_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.inner
            .required_headers
            .push((name.trim().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn expect_cookies(mut self, expect: Expect<Cookies>) -> Self {
        self.inner.cookies = expect;
        self
    }

    /// Requires a POST (`true`) or a GET (`false`).
    pub fn expect_post(mut self, is_post: bool) -> Self {
        self.inner.is_post = Expect::Equals(is_post);
        self
    }

    /// Requires this exact POST body.
    pub fn expect_post_body(mut self, body: impl Into<String>) -> Self {
        self.inner.post_body = Expect::Equals(body.into());
        self
    }

    /// Sets an arbitrary expectation on the POST body, e.g. to accept any ticket value.
    pub fn expect_post_body_with(mut self, expect: Expect<str>) -> Self {
        self.inner.post_body = expect;
        self
    }

    /// Requires this CA certificate path. `None` requires that no certificate was configured.
    pub fn expect_ca_cert(mut self, path: Option<&str>) -> Self {
        self.inner.ca_cert = Expect::Equals(path.map(str::to_owned));
        self
    }

    pub fn respond_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.response_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn respond_body(mut self, body: impl Into<String>) -> Self {
        self.inner.response_body = body.into();
        self
    }

    pub fn build(self) -> StaticFixture {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn url_matchers() {
        let exact = UrlMatcher::from("https://sso.example/cas/login");
        assert!(exact.matches("https://sso.example/cas/login"));
        assert!(!exact.matches("https://sso.example/cas/login?service=a"));

        let prefix = UrlMatcher::prefix("https://sso.example/cas/");
        assert!(prefix.matches("https://sso.example/cas/proxy?pgt=PGT-1"));
        assert!(!prefix.matches("https://other.example/cas/"));

        let pattern = UrlMatcher::pattern(r"^https://sso\.example/cas/p3/\w+Validate\?").unwrap();
        assert!(pattern.matches("https://sso.example/cas/p3/serviceValidate?ticket=ST-1"));
        assert!(!pattern.matches("https://sso.example/cas/serviceValidate?ticket=ST-1"));

        UrlMatcher::pattern("(unclosed").expect_err("invalid regex");
    }

    #[test]
    fn unconfigured_fixture_accepts_everything() {
        let fixture = StaticFixture::builder("https://sso.example/").build();
        assert!(fixture.validate_url("https://sso.example/"));
        assert!(fixture.validate_headers(&[]));
        assert!(fixture.validate_cookies(&Cookies::new()));
        assert!(fixture.validate_is_post(true));
        assert!(fixture.validate_is_post(false));
        assert!(fixture.validate_post_body("anything"));
        assert!(fixture.validate_ca_cert(None));
        assert!(fixture.validate_ca_cert(Some("/etc/ssl/ca.pem")));
        assert!(fixture.response_headers().is_empty());
        assert_eq!("", fixture.response_body());
    }

    #[test]
    fn required_headers_are_case_insensitive() {
        let fixture = StaticFixture::builder("https://sso.example/")
            .require_header("Content-Type", "application/x-www-form-urlencoded")
            .build();
        assert!(fixture.validate_headers(&lines(&[
            "Accept: */*",
            "content-type: application/x-www-form-urlencoded",
        ])));
        assert!(!fixture.validate_headers(&lines(&["Content-Type: text/plain"])));
        assert!(!fixture.validate_headers(&lines(&["not a header line"])));
    }

    #[test]
    fn header_rules_combine() {
        let fixture = StaticFixture::builder("https://sso.example/")
            .expect_headers(Expect::satisfies(|headers: &[String]| headers.len() == 2))
            .require_header("X-Trace", "1")
            .build();
        assert!(fixture.validate_headers(&lines(&["X-Trace: 1", "Accept: */*"])));
        assert!(!fixture.validate_headers(&lines(&["X-Trace: 1"])));
        assert!(!fixture.validate_headers(&lines(&["X-Other: 1", "Accept: */*"])));
    }

    #[test]
    fn exact_expectations() {
        let mut cookies = Cookies::new();
        cookies.insert("JSESSIONID".into(), "abc".into());
        let fixture = StaticFixture::builder("https://sso.example/")
            .expect_cookies(Expect::equals(cookies.clone()))
            .expect_post(true)
            .expect_post_body("ticket=abc")
            .expect_ca_cert(Some("/etc/ssl/ca.pem"))
            .build();

        assert!(fixture.validate_cookies(&cookies));
        assert!(!fixture.validate_cookies(&Cookies::new()));
        assert!(fixture.validate_is_post(true));
        assert!(!fixture.validate_is_post(false));
        assert!(fixture.validate_post_body("ticket=abc"));
        assert!(!fixture.validate_post_body("ticket=abd"));
        assert!(fixture.validate_ca_cert(Some("/etc/ssl/ca.pem")));
        assert!(!fixture.validate_ca_cert(None));
    }

    #[test]
    fn post_body_predicate() {
        let fixture = StaticFixture::builder("https://sso.example/cas/samlValidate")
            .expect_post_body_with(Expect::satisfies(|body: &str| {
                body.starts_with("<SOAP-ENV:Envelope") && body.contains("ST-")
            }))
            .build();
        assert!(fixture.validate_post_body("<SOAP-ENV:Envelope><ticket>ST-42</ticket>"));
        assert!(!fixture.validate_post_body("ticket=ST-42"));
        assert!(!fixture.validate_post_body(""));
    }

    #[test]
    fn expect_debug_hides_predicates() {
        let expect: Expect<str> = Expect::satisfies(|body: &str| body.is_empty());
        assert_eq!("Satisfies(<predicate>)", format!("{expect:?}"));
        let expect: Expect<str> = Expect::equals("a=b");
        assert_eq!("Equals(\"a=b\")", format!("{expect:?}"));
    }

    #[test]
    fn parse_header_lines() {
        let (name, value) = parse_header_line("Content-Type:  text/xml ").unwrap();
        assert_eq!("content-type", name.as_str());
        assert_eq!("text/xml", value);
        assert!(parse_header_line("HTTP/1.1 200 OK").is_none());
    }
}
