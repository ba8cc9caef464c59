// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The communication substrate consumed by the aggregator.
//!
//! A substrate is a process-wide facility with a two-phase lifecycle: it is
//! initialized by the embedding program before any test runs, and finalized
//! exactly once, normally by [`SubstrateGuard`](crate::environment::SubstrateGuard)
//! at shutdown. Nothing in this crate ever initializes a substrate.
//!
//! Communication happens over [`Communicator`]s: fixed, ranked sets of
//! processes with a private namespace for point-to-point and collective
//! operations. All operations here are blocking.

use crate::errors::SubstrateError;

/// A process's identity within a communicator, in `0..size`.
pub type Rank = usize;

/// A message tag for point-to-point transfers.
pub type Tag = i32;

/// The rank that collects and prints aggregated results.
pub const COORDINATOR: Rank = 0;

/// Process-wide access to a communication substrate.
///
/// Implementations are handles: cloning one refers to the same process-wide state.
pub trait Substrate: Clone {
    /// The communicator type produced by this substrate.
    type Communicator: Communicator;

    /// Returns true if the substrate has been initialized on this process.
    fn is_initialized(&self) -> Result<bool, SubstrateError>;

    /// Returns true if the substrate has been finalized on this process.
    fn is_finalized(&self) -> Result<bool, SubstrateError>;

    /// Finalizes the substrate. After this returns, every communicator handle is invalid.
    fn finalize(&self) -> Result<(), SubstrateError>;

    /// Returns the ambient communicator spanning every participating process.
    fn world(&self) -> Result<Self::Communicator, SubstrateError>;
}

/// A handle to a ranked, fixed-membership set of processes.
pub trait Communicator: Sized {
    /// Returns this process's rank within the communicator.
    fn rank(&self) -> Result<Rank, SubstrateError>;

    /// Returns the number of processes in the communicator.
    fn size(&self) -> Result<usize, SubstrateError>;

    /// Creates a new communicator over the same processes with a private context.
    ///
    /// Traffic on the duplicate never matches traffic on `self`. Every process must duplicate a
    /// given communicator the same number of times, in the same order.
    fn duplicate(&self) -> Result<Self, SubstrateError>;

    /// Releases the communicator.
    fn free(self) -> Result<(), SubstrateError>;

    /// Gathers one integer from every process onto `root`.
    ///
    /// Returns the values indexed by rank on `root`, and `None` everywhere else. Every process in
    /// the communicator must call this for any of them to return.
    fn gather_i32(&self, value: i32, root: Rank) -> Result<Option<Vec<i32>>, SubstrateError>;

    /// Sends an integer to `dest`.
    fn send_i32(&self, value: i32, dest: Rank, tag: Tag) -> Result<(), SubstrateError>;

    /// Receives an integer from `source`, blocking until one with a matching tag arrives.
    fn recv_i32(&self, source: Rank, tag: Tag) -> Result<i32, SubstrateError>;

    /// Sends a byte buffer to `dest`.
    fn send_bytes(&self, bytes: &[u8], dest: Rank, tag: Tag) -> Result<(), SubstrateError>;

    /// Receives at most `capacity` bytes from `source`, blocking until a message with a matching
    /// tag arrives.
    ///
    /// A message longer than `capacity` is an error.
    fn recv_bytes(&self, capacity: usize, source: Rank, tag: Tag)
    -> Result<Vec<u8>, SubstrateError>;
}
