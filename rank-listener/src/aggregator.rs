// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregation of assertion results onto the coordinating rank.
//!
//! [`ResultAggregator`] buffers the assertion results produced on its process while a test case
//! runs. When the test case ends, every rank takes part in the following exchange on the
//! aggregator's private communicator:
//!
//! 1. Every rank contributes the length of its buffer to a gather onto the coordinator. This is
//!    also the test case's only synchronization point, so ranks with nothing to report must still
//!    take part.
//! 2. Every other rank sends its buffered results to the coordinator, in buffer order, tagged with
//!    its own rank.
//! 3. The coordinator prints its own results, then receives and prints the announced number of
//!    results from ranks `1..size` in ascending order, then prints an end marker.
//! 4. Every rank clears its buffer.

use crate::{
    config::AggregatorConfig,
    errors::{AggregateError, ListenerError},
    harness::{AssertionResult, TestEventListener, TestInfo},
    substrate::{COORDINATOR, Communicator, Rank, Substrate},
    wire,
    write_str::WriteStr,
};
use owo_colors::{OwoColorize, Style};

/// A [`TestEventListener`] that prints every rank's assertion results from the coordinator.
///
/// Each aggregator owns a private duplicate of the communicator it was created with, so its
/// traffic never mixes with messages the code under test exchanges. The duplicate is released when
/// the aggregator is dropped, unless the substrate has been finalized by then.
pub struct ResultAggregator<S: Substrate, W> {
    substrate: S,
    // Always Some until dropped.
    comm: Option<S::Communicator>,
    rank: Rank,
    size: usize,
    results: Vec<AssertionResult>,
    config: AggregatorConfig,
    styles: Styles,
    writer: W,
}

impl<S: Substrate, W: WriteStr> ResultAggregator<S, W> {
    /// Creates an aggregator over the substrate's ambient communicator.
    pub fn new(substrate: S, config: AggregatorConfig, writer: W) -> Result<Self, AggregateError> {
        Self::check_initialized(&substrate)?;
        let world = substrate
            .world()
            .map_err(AggregateError::substrate("world"))?;
        Self::from_communicator(substrate, &world, config, writer)
    }

    /// Creates an aggregator over `comm`.
    ///
    /// The aggregator duplicates `comm` and never uses it directly.
    pub fn from_communicator(
        substrate: S,
        comm: &S::Communicator,
        config: AggregatorConfig,
        writer: W,
    ) -> Result<Self, AggregateError> {
        Self::check_initialized(&substrate)?;
        let comm = comm
            .duplicate()
            .map_err(AggregateError::substrate("duplicate"))?;
        let rank = comm.rank().map_err(AggregateError::substrate("rank"))?;
        let size = comm.size().map_err(AggregateError::substrate("size"))?;
        tracing::debug!(rank, size, "created result aggregator");

        let mut styles = Styles::default();
        if config.colorize {
            styles.colorize();
        }

        Ok(Self {
            substrate,
            comm: Some(comm),
            rank,
            size,
            results: Vec::new(),
            config,
            styles,
            writer,
        })
    }

    /// Creates a copy of this aggregator with its own private communicator.
    ///
    /// The copy starts with the same buffered results. Like construction, this must happen on every
    /// rank in the same order.
    pub fn try_clone(&self) -> Result<Self, AggregateError>
    where
        W: Clone,
    {
        Self::check_initialized(&self.substrate)?;
        let comm = self
            .comm()
            .duplicate()
            .map_err(AggregateError::substrate("duplicate"))?;

        Ok(Self {
            substrate: self.substrate.clone(),
            comm: Some(comm),
            rank: self.rank,
            size: self.size,
            results: self.results.clone(),
            config: self.config.clone(),
            styles: self.styles.clone(),
            writer: self.writer.clone(),
        })
    }

    /// Returns this process's rank within the private communicator.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Returns the number of processes in the private communicator.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the results buffered for the current test case.
    pub fn buffered(&self) -> &[AssertionResult] {
        &self.results
    }

    /// Returns the writer the coordinator prints to.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Prints the start notice for a test case. Only the coordinator prints.
    pub fn test_started(&mut self, info: &TestInfo) -> Result<(), AggregateError> {
        if self.rank == COORDINATOR {
            writeln!(self.writer, "*** Test {info} starting.").map_err(AggregateError::Write)?;
        }
        Ok(())
    }

    /// Buffers an assertion result. Never communicates.
    pub fn result_produced(&mut self, result: &AssertionResult) {
        self.results.push(result.clone());
    }

    /// Runs the aggregation exchange for a test case that just ended.
    ///
    /// Every rank must call this for every test case, whether or not it has buffered results.
    pub fn test_ended(&mut self, info: &TestInfo) -> Result<(), AggregateError> {
        let local_count = i32::try_from(self.results.len()).map_err(|_| {
            AggregateError::TooManyResults {
                count: self.results.len(),
            }
        })?;
        let counts = self
            .comm()
            .gather_i32(local_count, COORDINATOR)
            .map_err(AggregateError::substrate("gather"))?;

        match counts {
            Some(counts) => self.print_all(info, &counts)?,
            None => self.send_all()?,
        }

        self.results.clear();
        tracing::trace!(rank = self.rank, test = %info, "cleared result buffer");
        Ok(())
    }

    fn send_all(&self) -> Result<(), AggregateError> {
        let comm = self.comm();
        for result in &self.results {
            wire::send_result(comm, result, self.rank, self.config.text_framing)?;
        }
        tracing::debug!(
            rank = self.rank,
            sent = self.results.len(),
            "sent results to coordinator"
        );
        Ok(())
    }

    fn print_all(&mut self, info: &TestInfo, counts: &[i32]) -> Result<(), AggregateError> {
        tracing::debug!(test = %info, ?counts, "gathered result counts");

        let results = std::mem::take(&mut self.results);
        for result in &results {
            self.write_result(self.rank, result)?;
        }
        self.results = results;

        for (source, &count) in counts.iter().enumerate().skip(1) {
            let count = usize::try_from(count).map_err(|_| AggregateError::InvalidCount {
                rank: source,
                count,
            })?;
            for _ in 0..count {
                let result = wire::recv_result(self.comm(), source, self.config.text_framing)?;
                self.write_result(source, &result)?;
            }
            tracing::trace!(source, received = count, "received results");
        }

        writeln!(self.writer, "*** Test {info} ending.").map_err(AggregateError::Write)?;
        self.writer
            .write_str_flush()
            .map_err(AggregateError::Write)
    }

    fn write_result(&mut self, rank: Rank, result: &AssertionResult) -> Result<(), AggregateError> {
        let status = if result.failed() {
            "*** Failure".style(self.styles.fail)
        } else {
            "Success".style(self.styles.pass)
        };
        writeln!(
            self.writer,
            "      {status} on rank {rank}, {}:{}\n{}",
            result.file_name(),
            result.line_number(),
            result.summary(),
        )
        .map_err(AggregateError::Write)
    }

    fn comm(&self) -> &S::Communicator {
        self.comm
            .as_ref()
            .expect("communicator is only taken on drop")
    }

    fn check_initialized(substrate: &S) -> Result<(), AggregateError> {
        let initialized = substrate
            .is_initialized()
            .map_err(AggregateError::substrate("is_initialized"))?;
        if initialized {
            Ok(())
        } else {
            Err(AggregateError::NotInitialized)
        }
    }
}

impl<S: Substrate, W> Drop for ResultAggregator<S, W> {
    fn drop(&mut self) {
        let Some(comm) = self.comm.take() else {
            return;
        };
        match self.substrate.is_finalized() {
            // Finalization invalidated the handle already.
            Ok(true) => {}
            Ok(false) => match comm.free() {
                Ok(()) => tracing::debug!(rank = self.rank, "freed aggregator communicator"),
                Err(err) => {
                    tracing::warn!(rank = self.rank, %err, "failed to free aggregator communicator");
                }
            },
            Err(err) => {
                tracing::warn!(rank = self.rank, %err, "failed to query substrate finalization");
            }
        }
    }
}

impl<S: Substrate, W: WriteStr> TestEventListener for ResultAggregator<S, W> {
    fn on_test_start(&mut self, info: &TestInfo) -> Result<(), ListenerError> {
        Ok(self.test_started(info)?)
    }

    fn on_test_part_result(&mut self, result: &AssertionResult) -> Result<(), ListenerError> {
        self.result_produced(result);
        Ok(())
    }

    fn on_test_end(&mut self, info: &TestInfo) -> Result<(), ListenerError> {
        Ok(self.test_ended(info)?)
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    pass: Style,
    fail: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
    }
}
