//! Integration tests module
//!
//! End-to-end tests for the research journal, including:
//! - Batch runs with per-topic failure isolation
//! - Manual runs through the bounded dispatcher
//! - Service start, reconfiguration and timer firing
//! - The full store → search → journal pipeline on disk

pub mod batch_test;
pub mod dispatch_test;
pub mod pipeline_test;
pub mod service_test;
