//! Benchmark utilities for Rusty Broker.
//!
//! This crate provides the fixtures shared by the Criterion benchmarks:
//!
//! - **Events**: A small hierarchy of event types of realistic size
//! - **Populations**: Brokers pre-filled with handlers of mixed priority and filters
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p rusty_bench
//!
//! # Run specific benchmark group
//! cargo bench -p rusty_bench -- publish
//! ```
//!
//! # Benchmark Results
//!
//! Results are written to `target/criterion/` with HTML reports for visualization.

pub mod events;
pub mod population;
