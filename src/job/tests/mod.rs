//! Unit tests for the job module.

mod launcher_tests;
