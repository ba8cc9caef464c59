// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by rank-listener.

use crate::substrate::Rank;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, io};
use thiserror::Error;

/// Diagnostic shown when the communication substrate was not initialized before the test run.
pub(crate) const NOT_INITIALIZED_HINT: &str = "the communication substrate must be initialized \
     before the test run starts: initialize it in `main` before invoking the test run";

/// An error returned by a communication substrate call.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum SubstrateError {
    /// The substrate has not been initialized on this process.
    #[error("substrate is not initialized")]
    NotInitialized,

    /// The substrate was initialized twice.
    #[error("substrate is already initialized")]
    AlreadyInitialized,

    /// The substrate has been finalized and can no longer be used.
    #[error("substrate is already finalized")]
    Finalized,

    /// The communicator was freed.
    #[error("communicator has been freed")]
    CommunicatorFreed,

    /// A rank outside the communicator was addressed.
    #[error("rank {rank} is out of range for a communicator of size {size}")]
    InvalidRank {
        /// The rank that was addressed.
        rank: Rank,

        /// The communicator size.
        size: usize,
    },

    /// The received message did not carry the expected kind of payload.
    #[error("expected {expected} payload from rank {source_rank}, received {actual}")]
    PayloadMismatch {
        /// The sending rank.
        source_rank: Rank,

        /// The payload kind that was expected.
        expected: &'static str,

        /// The payload kind that arrived.
        actual: &'static str,
    },

    /// The incoming message was longer than the posted receive buffer.
    #[error("message of {actual} bytes from rank {source_rank} truncated to {capacity} bytes")]
    Truncated {
        /// The sending rank.
        source_rank: Rank,

        /// The size of the posted receive buffer.
        capacity: usize,

        /// The size of the incoming message.
        actual: usize,
    },

    /// The peer went away while a transfer was in progress.
    #[error("peer rank {peer} disconnected")]
    Disconnected {
        /// The rank of the peer.
        peer: Rank,
    },
}

/// An error that occurred while aggregating results.
///
/// Every variant is fatal for the run: the ranks agree on lengths and ordering
/// step by step, so a partial transfer cannot be resumed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AggregateError {
    /// The substrate was not initialized when the aggregator was created.
    #[error("{}", NOT_INITIALIZED_HINT)]
    NotInitialized,

    /// A substrate call failed.
    #[error("substrate call `{operation}` failed")]
    Substrate {
        /// The operation that failed.
        operation: &'static str,

        /// The underlying error.
        #[source]
        err: SubstrateError,
    },

    /// The local buffer holds more records than can be announced in the gather.
    #[error("{count} buffered results cannot be described by the wire format")]
    TooManyResults {
        /// The number of buffered results.
        count: usize,
    },

    /// The coordinator received a negative record count.
    #[error("rank {rank} announced an invalid record count {count}")]
    InvalidCount {
        /// The rank that announced the count.
        rank: Rank,

        /// The announced count.
        count: i32,
    },

    /// A length field was negative or otherwise unusable.
    #[error("rank {rank} sent an invalid {field} length {length}")]
    InvalidLength {
        /// The sending rank.
        rank: Rank,

        /// The field being described.
        field: &'static str,

        /// The length that was received.
        length: i32,
    },

    /// A text field is too long for the wire format.
    #[error("{field} of {len} bytes is too long to send")]
    FieldTooLong {
        /// The field being sent.
        field: &'static str,

        /// The byte length of the field.
        len: usize,
    },

    /// Writing the report failed.
    #[error("error writing aggregated results")]
    Write(#[source] io::Error),
}

impl AggregateError {
    pub(crate) fn substrate(operation: &'static str) -> impl FnOnce(SubstrateError) -> Self {
        move |err| Self::Substrate { operation, err }
    }
}

/// An error that occurred in a test environment's set-up or tear-down.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// The substrate was not initialized before the test run started.
    #[error("{}", NOT_INITIALIZED_HINT)]
    NotInitialized,

    /// A substrate query or call failed.
    #[error("substrate call `{operation}` failed")]
    Substrate {
        /// The operation that failed.
        operation: &'static str,

        /// The underlying error.
        #[source]
        err: SubstrateError,
    },

    /// Finalization returned, but the substrate still does not report itself as finalized.
    #[error("substrate still reports not finalized after finalization")]
    FinalizeIncomplete,
}

impl EnvironmentError {
    pub(crate) fn substrate(operation: &'static str) -> impl FnOnce(SubstrateError) -> Self {
        move |err| Self::Substrate { operation, err }
    }
}

/// An error returned by a [`TestEventListener`](crate::harness::TestEventListener).
#[derive(Debug, Error)]
#[error("test event listener failed")]
pub struct ListenerError {
    #[source]
    err: Box<dyn error::Error + Send + Sync>,
}

impl ListenerError {
    /// Creates a new `ListenerError` from an underlying error.
    pub fn new(err: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        Self { err: err.into() }
    }
}

impl From<AggregateError> for ListenerError {
    fn from(err: AggregateError) -> Self {
        Self::new(err)
    }
}

/// An error that stopped a test run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// An environment failed to set up.
    #[error("environment {index} failed to set up")]
    SetUp {
        /// The registration index of the environment.
        index: usize,

        /// The underlying error.
        #[source]
        err: EnvironmentError,
    },

    /// An environment failed to tear down.
    #[error("environment {index} failed to tear down")]
    TearDown {
        /// The registration index of the environment.
        index: usize,

        /// The underlying error.
        #[source]
        err: EnvironmentError,
    },

    /// A listener failed while handling an event.
    #[error("listener failed handling {event} for test `{test}`")]
    Listener {
        /// The event being handled.
        event: &'static str,

        /// The full name of the test.
        test: String,

        /// The underlying error.
        #[source]
        err: ListenerError,
    },
}

/// An error that occurred while parsing the aggregator config.
#[derive(Debug, Error)]
#[error("failed to parse rank-listener config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}
