//! Algorithm Service Registry
//!
//! Holds the live set of inference backends ("algorithm services") that have
//! registered with this node, and tracks their liveness from heartbeats.
//!
//! ## Core Mechanisms
//! - **Registration**: Upsert keyed by `service_id`. Re-registration replaces the
//!   endpoint, task types and version while keeping the call counter and the
//!   registration order.
//! - **Liveness**: Derived, never stored. A service is `live` while its last
//!   heartbeat is younger than the stale threshold, otherwise `stale`. Stale
//!   services stay listed but the load balancer will not route to them.
//! - **Eviction Sweep**: A timer-driven loop removes services whose heartbeat is
//!   older than the (much larger) eviction threshold.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
