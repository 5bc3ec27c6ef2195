pub mod alerts;
pub mod analytics;
pub mod api;
pub mod memory;
pub mod rate_limit;
pub mod schedule;
pub mod stats;
pub mod stores;
pub mod transports;

#[cfg(test)]
mod testutil;
