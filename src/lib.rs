//! Library crate for pool-scan-rs: a bounded worker-pool task executor and
//! a TCP connect port scanner that runs on it.
pub mod counter;
pub mod error;
pub mod executor;
pub mod ports;
pub mod probe;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod store;
pub mod types;
mod worker;
