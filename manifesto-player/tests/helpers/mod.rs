//! Test helper modules for manifesto-player integration tests
//!
//! - StubServer: axum router standing in for the generation service
//! - TestSession: controller wired to a recording sink and scripted generator

#![allow(dead_code)]

pub mod stub_server;
pub mod test_session;

pub use stub_server::{StubResponse, StubServer};
pub use test_session::{wait_for, TestSession};
