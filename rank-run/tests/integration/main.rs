// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the `rank-run` binary.

mod exit_codes;
mod fixtures;
