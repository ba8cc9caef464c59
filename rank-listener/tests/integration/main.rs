// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod aggregation;
mod lifecycle;
mod properties;
