// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host test framework interface.
//!
//! A [`TestRun`] drives a list of [`TestCase`]s on one process. It notifies registered
//! [`TestEventListener`]s as tests start, produce assertion results and end, and brackets the run
//! with the set-up and tear-down of registered [`Environment`]s.
//!
//! Every rank of a distributed run executes the same cases in the same order; only the assertion
//! results recorded within a case may differ between ranks.

use crate::errors::{EnvironmentError, HarnessError, ListenerError};
use std::{fmt, panic::Location};

/// Identifies a test case.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct TestInfo {
    suite: String,
    name: String,
}

impl TestInfo {
    /// Creates a new `TestInfo`.
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
        }
    }

    /// Returns the name of the suite the test belongs to.
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Returns the name of the test within its suite.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.suite, self.name)
    }
}

/// The outcome of one assertion check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AssertionResult {
    failed: bool,
    file_name: String,
    line_number: i32,
    summary: String,
}

impl AssertionResult {
    /// Creates a new assertion result.
    pub fn new(
        failed: bool,
        file_name: impl Into<String>,
        line_number: i32,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            failed,
            file_name: file_name.into(),
            line_number,
            summary: summary.into(),
        }
    }

    /// Returns true if the assertion failed.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Returns the file the assertion is in.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the line the assertion is on.
    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    /// Returns the human-readable description. May be empty or span several lines.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    fn at(location: &Location<'_>, failed: bool, summary: String) -> Self {
        Self::new(
            failed,
            location.file(),
            i32::try_from(location.line()).unwrap_or(i32::MAX),
            summary,
        )
    }
}

/// Receives notifications as a test run progresses.
pub trait TestEventListener {
    /// Called before a test case body runs.
    fn on_test_start(&mut self, info: &TestInfo) -> Result<(), ListenerError>;

    /// Called for every assertion result a test case produces, in order.
    ///
    /// Different processes may produce different numbers of results for the same test case.
    fn on_test_part_result(&mut self, result: &AssertionResult) -> Result<(), ListenerError>;

    /// Called after a test case body and all of its results have been reported.
    fn on_test_end(&mut self, info: &TestInfo) -> Result<(), ListenerError>;
}

/// Process-wide set-up and tear-down around a test run.
pub trait Environment {
    /// Called once before any test case runs.
    fn set_up(&mut self) -> Result<(), EnvironmentError>;

    /// Called once after every test case has run.
    fn tear_down(&mut self) -> Result<(), EnvironmentError>;
}

impl<T: TestEventListener + ?Sized> TestEventListener for &mut T {
    fn on_test_start(&mut self, info: &TestInfo) -> Result<(), ListenerError> {
        (**self).on_test_start(info)
    }

    fn on_test_part_result(&mut self, result: &AssertionResult) -> Result<(), ListenerError> {
        (**self).on_test_part_result(result)
    }

    fn on_test_end(&mut self, info: &TestInfo) -> Result<(), ListenerError> {
        (**self).on_test_end(info)
    }
}

impl<T: Environment + ?Sized> Environment for &mut T {
    fn set_up(&mut self) -> Result<(), EnvironmentError> {
        (**self).set_up()
    }

    fn tear_down(&mut self) -> Result<(), EnvironmentError> {
        (**self).tear_down()
    }
}

/// Returned by fatal assertions to stop the current test case body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FatalFailure;

/// Records the assertions made by a test case body.
///
/// Source locations are taken from the caller.
#[derive(Debug, Default)]
pub struct TestContext {
    results: Vec<AssertionResult>,
}

impl TestContext {
    /// Records an explicit success.
    #[track_caller]
    pub fn succeed(&mut self, summary: impl Into<String>) {
        self.record(Location::caller(), false, summary.into());
    }

    /// Records a non-fatal failure.
    #[track_caller]
    pub fn add_failure(&mut self, summary: impl Into<String>) {
        self.record(Location::caller(), true, summary.into());
    }

    /// Records a non-fatal failure if `condition` is false. Returns `condition`.
    #[track_caller]
    pub fn expect(&mut self, condition: bool, summary: impl Into<String>) -> bool {
        if !condition {
            self.record(Location::caller(), true, summary.into());
        }
        condition
    }

    /// Records a non-fatal failure if `left != right`. Returns true if they are equal.
    #[track_caller]
    pub fn expect_eq<T: PartialEq + fmt::Debug>(&mut self, left: T, right: T) -> bool {
        let equal = left == right;
        if !equal {
            self.record(
                Location::caller(),
                true,
                format!("assertion `left == right` failed\n  left: {left:?}\n right: {right:?}"),
            );
        }
        equal
    }

    /// Records a fatal failure if `condition` is false.
    ///
    /// Use with `?` so the failing body stops.
    #[track_caller]
    pub fn require(
        &mut self,
        condition: bool,
        summary: impl Into<String>,
    ) -> Result<(), FatalFailure> {
        if condition {
            Ok(())
        } else {
            self.record(Location::caller(), true, summary.into());
            Err(FatalFailure)
        }
    }

    /// Records a result produced elsewhere, keeping its source location.
    pub fn add_result(&mut self, result: AssertionResult) {
        self.results.push(result);
    }

    /// Returns the results recorded so far.
    pub fn results(&self) -> &[AssertionResult] {
        &self.results
    }

    fn record(&mut self, location: &Location<'_>, failed: bool, summary: String) {
        self.results
            .push(AssertionResult::at(location, failed, summary));
    }
}

type TestBody<'a> = Box<dyn Fn(&mut TestContext) -> Result<(), FatalFailure> + 'a>;

/// A test case: a name and a body.
pub struct TestCase<'a> {
    info: TestInfo,
    body: TestBody<'a>,
}

impl<'a> TestCase<'a> {
    /// Creates a new test case.
    pub fn new(
        suite: impl Into<String>,
        name: impl Into<String>,
        body: impl Fn(&mut TestContext) -> Result<(), FatalFailure> + 'a,
    ) -> Self {
        Self {
            info: TestInfo::new(suite, name),
            body: Box::new(body),
        }
    }

    /// Returns the identity of this test case.
    pub fn info(&self) -> &TestInfo {
        &self.info
    }
}

impl fmt::Debug for TestCase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Statistics about a completed test run on this process.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// The number of test cases that ran.
    pub tests_run: usize,

    /// The number of test cases with at least one failed assertion on this process.
    pub tests_failed_locally: usize,
}

impl RunSummary {
    /// Returns true if no assertion failed on this process.
    pub fn is_success(&self) -> bool {
        self.tests_failed_locally == 0
    }
}

/// Runs test cases, notifying listeners and environments.
#[derive(Default)]
pub struct TestRun<'a> {
    listeners: Vec<Box<dyn TestEventListener + 'a>>,
    environments: Vec<Box<dyn Environment + 'a>>,
}

impl<'a> TestRun<'a> {
    /// Creates a new, empty test run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener. Listeners are notified in registration order.
    pub fn add_listener(&mut self, listener: impl TestEventListener + 'a) -> &mut Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Registers an environment. Environments are set up in registration order and torn down in
    /// reverse order.
    pub fn add_environment(&mut self, environment: impl Environment + 'a) -> &mut Self {
        self.environments.push(Box::new(environment));
        self
    }

    /// Runs `cases` in order.
    ///
    /// Any environment or listener error stops the run immediately and is returned: such errors
    /// mean that ranks can no longer stay in step, so they are never turned into test failures.
    pub fn run(&mut self, cases: &[TestCase<'_>]) -> Result<RunSummary, HarnessError> {
        for (index, environment) in self.environments.iter_mut().enumerate() {
            environment
                .set_up()
                .map_err(|err| HarnessError::SetUp { index, err })?;
        }

        let mut summary = RunSummary::default();
        for case in cases {
            let failed = self.run_case(case)?;
            summary.tests_run += 1;
            if failed {
                summary.tests_failed_locally += 1;
            }
        }

        for (index, environment) in self.environments.iter_mut().enumerate().rev() {
            environment
                .tear_down()
                .map_err(|err| HarnessError::TearDown { index, err })?;
        }

        tracing::debug!(
            tests_run = summary.tests_run,
            tests_failed_locally = summary.tests_failed_locally,
            "test run complete"
        );
        Ok(summary)
    }

    fn run_case(&mut self, case: &TestCase<'_>) -> Result<bool, HarnessError> {
        let info = &case.info;
        self.notify("test start", info, |listener| listener.on_test_start(info))?;

        let mut cx = TestContext::default();
        if (case.body)(&mut cx).is_err() {
            tracing::debug!(test = %info, "test body stopped at a fatal assertion");
        }

        for result in &cx.results {
            self.notify("test part result", info, |listener| {
                listener.on_test_part_result(result)
            })?;
        }

        self.notify("test end", info, |listener| listener.on_test_end(info))?;
        Ok(cx.results.iter().any(AssertionResult::failed))
    }

    fn notify(
        &mut self,
        event: &'static str,
        info: &TestInfo,
        mut f: impl FnMut(&mut dyn TestEventListener) -> Result<(), ListenerError>,
    ) -> Result<(), HarnessError> {
        for listener in &mut self.listeners {
            f(listener.as_mut()).map_err(|err| HarnessError::Listener {
                event,
                test: info.to_string(),
                err,
            })?;
        }
        Ok(())
    }
}
