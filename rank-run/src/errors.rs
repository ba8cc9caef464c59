// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// An error that occurred while loading a scenario file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario at `{path}`")]
    Read {
        /// The path to the scenario.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The scenario file is not valid.
    #[error("failed to parse scenario at `{path}`")]
    Parse {
        /// The path to the scenario.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: toml::de::Error,
    },

    /// An assertion names a rank that does not exist.
    #[error("test `{test}` has an assertion on rank {rank}, but only {ranks} ranks are running")]
    RankOutOfRange {
        /// The full name of the test.
        test: String,

        /// The rank named by the assertion.
        rank: usize,

        /// The number of ranks.
        ranks: usize,
    },
}
