// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a per-rank assertion scenario on in-process ranks and prints the report that rank 0
//! aggregates.

mod dispatch;
mod errors;
mod output;
mod scenario;

pub use dispatch::{EXIT_FATAL, EXIT_SUCCESS, EXIT_TEST_FAILED, RankRunApp};
pub use errors::ScenarioError;
pub use output::{Color, OutputContext};
pub use scenario::Scenario;
