// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rank_run::{EXIT_FATAL, EXIT_SUCCESS, EXIT_TEST_FAILED};

#[test]
fn failed_assertion_exits_with_test_failure() {
    let output = RankRunCli::new()
        .args(["--ranks", "3", scenario_path("uneven.toml").as_str()])
        .output();

    assert_eq!(output.exit_code(), Some(EXIT_TEST_FAILED), "{output}");
    assert_eq!(
        output.stdout_as_str(),
        indoc! {"
            *** Test Gather.uneven starting.
                  *** Failure on rank 1, a.cpp:42
            x != y
                  Success on rank 2, b.cpp:7
            explicit success
                  *** Failure on rank 2, b.cpp:9
            Expected equality of these values:
              left
              right
            *** Test Gather.uneven ending.
            *** Test Gather.quiet starting.
            *** Test Gather.quiet ending.
        "},
        "{output}"
    );
}

#[test]
fn passing_scenario_exits_with_success() {
    let output = RankRunCli::new()
        .args(["--ranks", "2", scenario_path("passing.toml").as_str()])
        .output();

    assert_eq!(output.exit_code(), Some(EXIT_SUCCESS), "{output}");
    assert_eq!(
        output.stdout_as_str(),
        indoc! {"
            *** Test Gather.passing starting.
                  Success on rank 0, a.cpp:3
            ready
                  Success on rank 1, b.cpp:5
            ready
            *** Test Gather.passing ending.
        "},
        "{output}"
    );
}

#[test]
fn rank_out_of_range_is_fatal() {
    let output = RankRunCli::new()
        .args(["--ranks", "2", scenario_path("uneven.toml").as_str()])
        .output();

    assert_eq!(output.exit_code(), Some(EXIT_FATAL), "{output}");
    assert_eq!(output.stdout_as_str(), "", "nothing is reported on stdout");
    assert!(
        output
            .stderr_as_str()
            .contains("test `Gather.uneven` has an assertion on rank 2, but only 2 ranks are running"),
        "{output}"
    );
}
