// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scenario files: which assertion results each rank produces in each test.
//!
//! ```toml
//! [[test]]
//! suite = "Gather"
//! name = "uneven"
//!
//! [[test.assertion]]
//! rank = 1
//! failed = true
//! file = "a.cpp"
//! line = 42
//! summary = "x != y"
//! ```

use crate::errors::ScenarioError;
use camino::Utf8Path;
use rank_listener::{
    harness::{AssertionResult, TestCase, TestInfo},
    substrate::Rank,
};
use serde::Deserialize;

/// A parsed scenario file.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(rename = "test", default)]
    tests: Vec<ScenarioTest>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
struct ScenarioTest {
    suite: String,
    name: String,
    #[serde(rename = "assertion", default)]
    assertions: Vec<ScenarioAssertion>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
struct ScenarioAssertion {
    rank: Rank,
    #[serde(default)]
    failed: bool,
    file: String,
    line: i32,
    #[serde(default)]
    summary: String,
}

impl Scenario {
    /// Reads a scenario from `path`.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path).map_err(|err| ScenarioError::Read {
            path: path.to_owned(),
            err,
        })?;
        Self::from_toml_str(&contents).map_err(|err| ScenarioError::Parse {
            path: path.to_owned(),
            err,
        })
    }

    /// Parses a scenario from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Returns the number of tests in the scenario.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Checks that every assertion names one of `ranks` ranks.
    pub fn validate(&self, ranks: usize) -> Result<(), ScenarioError> {
        for test in &self.tests {
            if let Some(assertion) = test.assertions.iter().find(|a| a.rank >= ranks) {
                return Err(ScenarioError::RankOutOfRange {
                    test: TestInfo::new(&test.suite, &test.name).to_string(),
                    rank: assertion.rank,
                    ranks,
                });
            }
        }
        Ok(())
    }

    /// Returns the test cases as seen by `rank`: each one records that rank's assertions in file
    /// order.
    pub fn test_cases(&self, rank: Rank) -> Vec<TestCase<'_>> {
        self.tests
            .iter()
            .map(|test| {
                TestCase::new(&test.suite, &test.name, move |cx| {
                    for assertion in test.assertions.iter().filter(|a| a.rank == rank) {
                        cx.add_result(AssertionResult::new(
                            assertion.failed,
                            &assertion.file,
                            assertion.line,
                            &assertion.summary,
                        ));
                    }
                    Ok(())
                })
            })
            .collect()
    }
}
