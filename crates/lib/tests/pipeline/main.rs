//! End-to-end pipeline tests.
//!
//! The native toolchain is replaced by a shell script standing in for
//! `cmake`, so these tests only run on unix.

#![cfg(unix)]

mod common;
mod fetch_tests;
mod pipeline_tests;
