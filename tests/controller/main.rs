//! Controller integration tests
//!
//! Each test builds an in-memory fabric (static topology plus recording
//! switches) and drives packet-ins through the public controller API.
//!
//! Run with: cargo test --test controller

mod arp;
mod forwarding;
mod harness;
