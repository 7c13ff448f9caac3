//! Host-level data sources.

pub mod traffic;

pub use self::traffic::{CounterSource, FixedSampler, ProcNetDev, RateSampler, TrafficSampler};
