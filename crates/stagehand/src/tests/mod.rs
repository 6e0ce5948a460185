//! Test suites for the engine bootstrap shim.

mod lifecycle_tests;
mod support;
