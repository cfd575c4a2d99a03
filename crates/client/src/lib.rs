//! Network-facing half of the harbor agent.
//!
//! This crate provides the reqwest fetch client, the strategy router that
//! serves intercepted requests from cache and network, and the delivery
//! sweep that drains the telemetry queue.

pub mod delivery;
pub mod fetch;
pub mod network;
pub mod router;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use delivery::{Deliverer, SweepReport};
pub use fetch::{FetchClient, FetchConfig};
pub use network::Network;
pub use router::{ResponseSource, Routed, Router, RouterConfig, Strategy};
