//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the register and exercise the
//! fetcher, the page walker and the coordinator against it.

mod common;
mod download_tests;
mod pagination_tests;
