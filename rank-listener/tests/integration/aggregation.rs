// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use rank_listener::{
    config::{AggregatorConfig, TextFraming},
    harness::{AssertionResult, RunSummary},
};
use test_case::test_case;

fn fail(file: &str, line: i32, summary: &str) -> AssertionResult {
    AssertionResult::new(true, file, line, summary)
}

fn pass(file: &str, line: i32, summary: &str) -> AssertionResult {
    AssertionResult::new(false, file, line, summary)
}

#[test]
fn remote_failure_round_trips() {
    let cases = [CaseFixture::new(
        "Remote",
        "round_trip",
        vec![vec![], vec![fail("a.cpp", 42, "x != y")]],
    )];

    let output = run_cases(2, &cases, &AggregatorConfig::default());

    assert_eq!(
        output.coordinator(),
        indoc! {"
            *** Test Remote.round_trip starting.
                  *** Failure on rank 1, a.cpp:42
            x != y
            *** Test Remote.round_trip ending.
        "}
    );
    assert_eq!(output.printed[1], "", "only the coordinator prints");
}

#[test_case(TextFraming::NulTerminated ; "nul terminated")]
#[test_case(TextFraming::LengthOnly ; "length only")]
fn embedded_nul_prints_the_same_from_every_rank(framing: TextFraming) {
    let result = fail("a.cpp", 42, "left\0right");
    let cases = [CaseFixture::new(
        "Remote",
        "embedded_nul",
        vec![vec![result.clone()], vec![result]],
    )];

    let output = run_cases(
        2,
        &cases,
        &AggregatorConfig::default().with_text_framing(framing),
    );

    assert_eq!(
        output.coordinator(),
        "*** Test Remote.embedded_nul starting.\n\
         \x20     *** Failure on rank 0, a.cpp:42\nleft\0right\n\
         \x20     *** Failure on rank 1, a.cpp:42\nleft\0right\n\
         *** Test Remote.embedded_nul ending.\n"
    );
}

#[test_case(1 ; "one rank")]
#[test_case(3 ; "three ranks")]
#[test_case(8 ; "eight ranks")]
fn no_results_prints_only_markers(size: usize) {
    let cases = [CaseFixture::new("Empty", "quiet", vec![])];

    let output = run_cases(size, &cases, &AggregatorConfig::default());

    assert_eq!(
        output.coordinator(),
        indoc! {"
            *** Test Empty.quiet starting.
            *** Test Empty.quiet ending.
        "}
    );
    assert!(
        output
            .summaries
            .iter()
            .all(|summary| *summary == RunSummary { tests_run: 1, tests_failed_locally: 0 })
    );
}

#[test_case(TextFraming::NulTerminated ; "nul terminated")]
#[test_case(TextFraming::LengthOnly ; "length only")]
fn variable_length_summaries_stay_delimited(framing: TextFraming) {
    let cases = [CaseFixture::new(
        "Asymmetric",
        "lengths",
        vec![
            vec![],
            vec![
                fail("b.cpp", 10, ""),
                pass("b.cpp", 11, "first line\nsecond line"),
                fail("longer/path/to/c.cpp", 1200, "a considerably longer summary than the rest"),
            ],
        ],
    )];

    let config = AggregatorConfig::default().with_text_framing(framing);
    let output = run_cases(2, &cases, &config);

    assert_eq!(
        output.coordinator(),
        indoc! {"
            *** Test Asymmetric.lengths starting.
                  *** Failure on rank 1, b.cpp:10

                  Success on rank 1, b.cpp:11
            first line
            second line
                  *** Failure on rank 1, longer/path/to/c.cpp:1200
            a considerably longer summary than the rest
            *** Test Asymmetric.lengths ending.
        "}
    );
    assert_eq!(
        output.summaries[0],
        RunSummary {
            tests_run: 1,
            tests_failed_locally: 0,
        }
    );
    assert_eq!(
        output.summaries[1],
        RunSummary {
            tests_run: 1,
            tests_failed_locally: 1,
        }
    );
}

#[test]
fn ranks_print_in_ascending_order() {
    let cases = [
        CaseFixture::new(
            "Order",
            "first",
            vec![
                vec![fail("r0.cpp", 1, "zero")],
                vec![],
                vec![fail("r2.cpp", 1, "two a"), fail("r2.cpp", 2, "two b")],
                vec![pass("r3.cpp", 1, "three")],
            ],
        ),
        CaseFixture::new(
            "Order",
            "second",
            vec![vec![], vec![fail("r1.cpp", 5, "one")], vec![], vec![]],
        ),
    ];

    let output = run_cases(4, &cases, &AggregatorConfig::default());

    assert_eq!(
        output.coordinator(),
        indoc! {"
            *** Test Order.first starting.
                  *** Failure on rank 0, r0.cpp:1
            zero
                  *** Failure on rank 2, r2.cpp:1
            two a
                  *** Failure on rank 2, r2.cpp:2
            two b
                  Success on rank 3, r3.cpp:1
            three
            *** Test Order.first ending.
            *** Test Order.second starting.
                  *** Failure on rank 1, r1.cpp:5
            one
            *** Test Order.second ending.
        "}
    );
    for rank in 1..4 {
        assert_eq!(output.printed[rank], "", "rank {rank} prints nothing");
    }
}
