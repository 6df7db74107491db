/// Round-robin backend pool
use crate::core::Endpoint;
use crate::error::{GatewayError, GatewayResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered set of equivalent endpoints plus a rotating cursor.
///
/// The endpoint list is fixed at construction; only the cursor moves, once per
/// `next()`. There is no health tracking: an endpoint that is down is still
/// handed out on its turn.
#[derive(Debug)]
pub struct BackendPool {
    name: String,
    endpoints: Vec<Endpoint>,
    cursor: AtomicUsize,
}

impl BackendPool {
    /// Build a pool, rejecting an empty endpoint list
    pub fn new<S: Into<String>>(name: S, endpoints: Vec<Endpoint>) -> GatewayResult<Self> {
        let name = name.into();
        if endpoints.is_empty() {
            return Err(GatewayError::empty_pool(name));
        }

        Ok(Self {
            name,
            endpoints,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Return the endpoint under the cursor and advance it by one.
    ///
    /// The read and the advance happen in a single atomic update, so concurrent
    /// callers never observe the same cursor value twice in a row.
    pub fn next(&self) -> &Endpoint {
        let len = self.endpoints.len();
        let index = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| Some((cur + 1) % len))
            .unwrap_or_else(|cur| cur);
        &self.endpoints[index]
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}
