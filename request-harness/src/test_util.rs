/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Structured log capture for tests that drive the harness.
//!
//! The harness logs fixture selection, rejections and 404s with `url`, `index` and `attribute`
//! fields. [`capture_test_logs`] records those events with their fields so tests can assert on
//! which URL was rejected and for which attribute, rather than grepping formatted output.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::EnvFilter;

const VERBOSE_TEST_LOGS: &str = "VERBOSE_TEST_LOGS";

/// A guard that stops log capturing upon being dropped.
#[derive(Debug)]
pub struct LogCaptureGuard(#[allow(dead_code)] DefaultGuard);

/// One log event recorded by [`capture_test_logs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Every other field, formatted with its `Display` or `Debug` value.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Captures every log event emitted on this thread until the guard is dropped.
///
/// Setting `VERBOSE_TEST_LOGS` also echoes events to the test output. Its value is used as an
/// env filter; `1` or `true` means `trace`.
#[must_use]
pub fn capture_test_logs() -> (LogCaptureGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let verbose = verbose_filter().map(|filter| {
        tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_filter(EnvFilter::new(filter))
    });
    let subscriber = tracing_subscriber::registry()
        .with(CaptureLayer(logs.clone()))
        .with(verbose);
    let guard = tracing::subscriber::set_default(subscriber);
    (LogCaptureGuard(guard), logs)
}

fn verbose_filter() -> Option<String> {
    match env::var(VERBOSE_TEST_LOGS).ok()?.as_str() {
        "1" | "true" => Some("trace".into()),
        filter => Some(filter.into()),
    }
}

/// Events recorded by [`capture_test_logs`], in emission order.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events whose message is exactly `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.filter(|event| event.message == message)
    }

    /// Events carrying `name` with the given formatted value, e.g. `("url", "https://...")`.
    pub fn with_field(&self, name: &str, value: &str) -> Vec<CapturedEvent> {
        self.filter(|event| event.field(name) == Some(value))
    }

    pub fn contains(&self, message: &str) -> bool {
        !self.with_message(message).is_empty()
    }

    fn filter(&self, keep: impl Fn(&CapturedEvent) -> bool) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| keep(event))
            .cloned()
            .collect()
    }

    fn push(&self, event: CapturedEvent) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

struct CaptureLayer(CapturedLogs);

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.0.push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}
