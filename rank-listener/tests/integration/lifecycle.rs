// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::test_init;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use rank_listener::{
    aggregator::ResultAggregator,
    config::AggregatorConfig,
    environment::{GuardState, SubstrateGuard},
    errors::{EnvironmentError, HarnessError},
    harness::{AssertionResult, Environment, TestCase, TestInfo, TestRun},
    local::LocalWorld,
    substrate::{Communicator, Substrate},
    write_str::SharedBuffer,
};

#[test]
fn buffers_are_empty_after_every_test_end() -> Result<()> {
    test_init();

    let leftovers = LocalWorld::run(3, |process| -> Result<Vec<usize>> {
        process.init()?;
        let rank = process.rank();
        let mut aggregator =
            ResultAggregator::new(process, AggregatorConfig::default(), SharedBuffer::new())?;

        let mut leftovers = Vec::new();
        for round in 0..3 {
            let info = TestInfo::new("Buffer", format!("round_{round}"));
            aggregator.test_started(&info)?;
            for line in 0..(rank + round) {
                aggregator.result_produced(&AssertionResult::new(
                    true,
                    "buffer.rs",
                    line as i32,
                    "",
                ));
            }
            aggregator.test_ended(&info)?;
            leftovers.push(aggregator.buffered().len());
        }
        Ok(leftovers)
    });

    for (rank, leftovers) in leftovers.into_iter().enumerate() {
        let leftovers = leftovers?;
        ensure!(
            leftovers.iter().all(|&len| len == 0),
            "rank {rank} kept results: {leftovers:?}"
        );
    }
    Ok(())
}

#[test]
fn second_aggregator_has_an_independent_channel() -> Result<()> {
    test_init();

    let outputs = LocalWorld::run(2, |process| -> Result<String> {
        process.init()?;
        let world = process.world()?;
        let buffer = SharedBuffer::new();

        let first = ResultAggregator::from_communicator(
            process.clone(),
            &world,
            AggregatorConfig::default(),
            buffer.clone(),
        )?;
        let mut second = ResultAggregator::from_communicator(
            process.clone(),
            &world,
            AggregatorConfig::default(),
            buffer.clone(),
        )?;
        drop(first);

        let info = TestInfo::new("Independent", "channel");
        let rank = second.rank();
        second.result_produced(&AssertionResult::new(
            false,
            "independent.rs",
            rank as i32,
            "still here",
        ));
        second.test_ended(&info)?;

        // The ambient communicator is untouched as well.
        ensure!(world.size()? == 2, "world communicator still usable");
        Ok(buffer.contents())
    });

    let outputs: Vec<_> = outputs.into_iter().collect::<Result<_>>()?;
    assert_eq!(
        outputs[0],
        "      Success on rank 0, independent.rs:0\nstill here\n      \
         Success on rank 1, independent.rs:1\nstill here\n*** Test Independent.channel ending.\n"
    );
    Ok(())
}

#[test]
fn run_without_initialization_fails_with_diagnostic() {
    test_init();

    let process = LocalWorld::new(1).process(0).expect("rank 0 exists");
    let mut guard = SubstrateGuard::new(process);
    let cases = [TestCase::new("Never", "runs", |_| Ok(()))];

    let err = TestRun::new()
        .add_environment(&mut guard)
        .run(&cases)
        .expect_err("the substrate is not initialized");

    match err {
        HarnessError::SetUp {
            index: 0,
            err: err @ EnvironmentError::NotInitialized,
        } => {
            let message = err.to_string();
            assert!(
                message.contains("must be initialized before the test run starts"),
                "diagnostic explains the fix: {message}"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(guard.state(), GuardState::Unchecked);
}

#[test]
fn guard_finalizes_every_rank() {
    test_init();

    let states = LocalWorld::run(3, |process| {
        process.init().expect("init succeeds");
        let mut guard = SubstrateGuard::new(process.clone());
        guard.set_up().expect("set up succeeds");
        guard.tear_down().expect("tear down succeeds");
        (guard.state(), process.is_finalized())
    });

    for state in states {
        assert_eq!(state, (GuardState::Finalized, Ok(true)));
    }
}
