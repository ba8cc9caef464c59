// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Rank-ordered aggregation of test assertion results.
//!
//! When the same test suite runs on several cooperating processes, assertion
//! failures happen independently on each of them. Printing them locally
//! interleaves output unpredictably and hides failures on non-coordinating
//! processes. This crate buffers results on every process and, at the end of
//! each test case, collects them onto rank 0 which prints them in rank order.
//!
//! The main entry points are:
//!
//! * [`ResultAggregator`](aggregator::ResultAggregator), a
//!   [`TestEventListener`](harness::TestEventListener) that performs the
//!   aggregation.
//! * [`SubstrateGuard`](environment::SubstrateGuard), an
//!   [`Environment`](harness::Environment) that checks the communication
//!   substrate is up at startup and finalizes it at shutdown.
//!
//! The communication substrate is abstracted by the traits in [`substrate`];
//! [`local`] provides an implementation where each rank is a thread.

pub mod aggregator;
pub mod config;
pub mod environment;
pub mod errors;
pub mod harness;
pub mod local;
pub mod substrate;
mod wire;
pub mod write_str;
