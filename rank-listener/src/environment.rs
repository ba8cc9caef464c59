// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide lifecycle guard for the communication substrate.

use crate::{
    errors::EnvironmentError,
    harness::Environment,
    substrate::{COORDINATOR, Communicator, Substrate},
};

/// An [`Environment`] that checks the substrate is initialized when a test run starts and finalizes
/// it once the run is over.
///
/// The guard never initializes the substrate: that is the embedding program's job, and has to
/// happen before the test run starts.
#[derive(Clone, Debug)]
pub struct SubstrateGuard<S> {
    substrate: S,
    state: GuardState,
}

/// Where a [`SubstrateGuard`] is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GuardState {
    /// Set-up has not yet succeeded.
    Unchecked,

    /// The substrate was found initialized during set-up.
    Checked,

    /// The substrate has been finalized.
    Finalized,
}

impl<S: Substrate> SubstrateGuard<S> {
    /// Creates a new guard.
    pub fn new(substrate: S) -> Self {
        Self {
            substrate,
            state: GuardState::Unchecked,
        }
    }

    /// Returns the current state of the guard.
    pub fn state(&self) -> GuardState {
        self.state
    }
}

impl<S: Substrate> Environment for SubstrateGuard<S> {
    fn set_up(&mut self) -> Result<(), EnvironmentError> {
        let initialized = self
            .substrate
            .is_initialized()
            .map_err(EnvironmentError::substrate("is_initialized"))?;
        if !initialized {
            return Err(EnvironmentError::NotInitialized);
        }
        self.state = GuardState::Checked;
        Ok(())
    }

    fn tear_down(&mut self) -> Result<(), EnvironmentError> {
        let finalized = self
            .substrate
            .is_finalized()
            .map_err(EnvironmentError::substrate("is_finalized"))?;

        if !finalized {
            let rank = self
                .substrate
                .world()
                .and_then(|world| world.rank())
                .map_err(EnvironmentError::substrate("rank"))?;
            if rank == COORDINATOR {
                tracing::info!("finalizing communication substrate");
            }
            self.substrate
                .finalize()
                .map_err(EnvironmentError::substrate("finalize"))?;
        }

        let finalized = self
            .substrate
            .is_finalized()
            .map_err(EnvironmentError::substrate("is_finalized"))?;
        if !finalized {
            return Err(EnvironmentError::FinalizeIncomplete);
        }
        self.state = GuardState::Finalized;
        Ok(())
    }
}
