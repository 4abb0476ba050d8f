/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::fixture::SharedFixture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The ordered set of fixtures requests are matched against.
///
/// Registration order is match priority: the first fixture whose URL matcher selects a request
/// handles it, and later fixtures are never consulted for that request. Duplicates are kept.
///
/// Cloning a registry yields another handle to the same fixtures, so a registry can be handed
/// to any number of [`RequestStub`](crate::stub::RequestStub)s and still be updated or cleared
/// by the test afterwards. Nothing clears the registry implicitly; call
/// [`clear_responses`](Self::clear_responses) (or drop every handle) between test cases.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    fixtures: Arc<Mutex<Vec<SharedFixture>>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SharedFixture>> {
        // Fixtures are immutable, so a panic while the lock was held cannot leave them inconsistent
        self.fixtures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a fixture. It is visible to every handle of this registry immediately.
    pub fn add_response(&self, fixture: impl Into<SharedFixture>) {
        let mut fixtures = self.lock();
        fixtures.push(fixture.into());
        tracing::trace!(count = fixtures.len(), "registered response fixture");
    }

    /// Removes every fixture. Calling this on an empty registry is a no-op.
    pub fn clear_responses(&self) {
        self.lock().clear();
        tracing::trace!("cleared response fixtures");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the registered fixtures in registration order.
    ///
    /// The returned list is a snapshot; fixtures added later are not reflected in it.
    pub fn fixtures(&self) -> Vec<SharedFixture> {
        self.lock().clone()
    }
}
