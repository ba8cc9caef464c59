// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use proptest::{collection::vec, prelude::*};
use rank_listener::{config::AggregatorConfig, harness::AssertionResult};
use std::fmt::Write;

fn result_strategy() -> impl Strategy<Value = AssertionResult> {
    (any::<bool>(), "[a-z]{1,8}\\.rs", 0..5000i32, "[ -~]{0,40}").prop_map(
        |(failed, file, line, summary)| AssertionResult::new(failed, file, line, summary),
    )
}

fn scripts_strategy() -> impl Strategy<Value = Vec<RankScript>> {
    (1..6usize).prop_flat_map(|size| vec(vec(result_strategy(), 0..5), size))
}

fn expected_report(scripts: &[RankScript]) -> String {
    let mut out = String::from("*** Test Prop.laws starting.\n");
    for (rank, script) in scripts.iter().enumerate() {
        for result in script {
            let status = if result.failed() { "*** Failure" } else { "Success" };
            writeln!(
                out,
                "      {status} on rank {rank}, {}:{}\n{}",
                result.file_name(),
                result.line_number(),
                result.summary()
            )
            .unwrap();
        }
    }
    out.push_str("*** Test Prop.laws ending.\n");
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Every record is printed exactly once, grouped by ascending rank, in each rank's local order.
    #[test]
    fn coordinator_prints_every_record_in_order(scripts in scripts_strategy()) {
        let size = scripts.len();
        let total: usize = scripts.iter().map(Vec::len).sum();
        let cases = [CaseFixture::new("Prop", "laws", scripts.clone())];

        let output = run_cases(size, &cases, &AggregatorConfig::default());

        let record_lines = output
            .coordinator()
            .lines()
            .filter(|line| line.starts_with("      *** Failure on rank") || line.starts_with("      Success on rank"))
            .count();
        prop_assert_eq!(record_lines, total);
        prop_assert_eq!(output.coordinator(), expected_report(&scripts));
    }
}
