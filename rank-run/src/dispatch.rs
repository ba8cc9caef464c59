// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    output::{Color, OutputContext, OutputOpts},
    scenario::Scenario,
};
use camino::Utf8PathBuf;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use rank_listener::{
    aggregator::ResultAggregator,
    config::AggregatorConfig,
    environment::SubstrateGuard,
    harness::{RunSummary, TestRun},
    local::{LocalProcess, LocalWorld},
    write_str::StdoutSink,
};

/// Exit code when no assertion failed on any rank.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when at least one assertion failed on some rank.
pub const EXIT_TEST_FAILED: i32 = 1;

/// Exit code when a rank hit an unrecoverable error.
pub const EXIT_FATAL: i32 = 2;

/// Runs a scenario on in-process ranks and prints the report aggregated on rank 0.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct RankRunApp {
    /// Path to the scenario file
    scenario: Utf8PathBuf,

    /// Number of ranks to run
    #[arg(
        long,
        short = 'n',
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..=1024),
        env = "RANK_RUN_RANKS"
    )]
    ranks: u32,

    /// Aggregator config file, layered on top of the defaults
    #[arg(long, value_name = "PATH", env = "RANK_RUN_CONFIG")]
    config: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,
}

impl RankRunApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Runs the scenario and returns the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let ranks = self.ranks as usize;
        let scenario = Scenario::from_path(&self.scenario)?;
        scenario.validate(ranks)?;

        let mut config = AggregatorConfig::from_sources(self.config.as_deref())
            .wrap_err("failed to load aggregator config")?;
        let colorize = match output.color {
            Color::Always => true,
            Color::Never => false,
            Color::Auto => {
                config.colorize && output.should_colorize(supports_color::Stream::Stdout)
            }
        };
        config = config.with_colorize(colorize);

        tracing::debug!(
            ranks,
            tests = scenario.test_count(),
            framing = %config.text_framing,
            verbose = output.verbose,
            "starting scenario"
        );

        let summaries = LocalWorld::run(ranks, |process| {
            let rank = process.rank();
            match run_rank(process, &scenario, &config) {
                Ok(summary) => summary,
                Err(err) => {
                    // The other ranks cannot finish their collectives without this one, so the
                    // whole process has to go.
                    let report = err.wrap_err(format!("rank {rank} hit an unrecoverable error"));
                    eprintln!("Error: {report:?}");
                    std::process::exit(EXIT_FATAL);
                }
            }
        });

        let failed_ranks: Vec<_> = summaries
            .iter()
            .enumerate()
            .filter(|(_, summary)| !summary.is_success())
            .map(|(rank, _)| rank)
            .collect();
        if failed_ranks.is_empty() {
            Ok(EXIT_SUCCESS)
        } else {
            tracing::info!(?failed_ranks, "assertions failed");
            Ok(EXIT_TEST_FAILED)
        }
    }
}

fn run_rank(
    process: LocalProcess,
    scenario: &Scenario,
    config: &AggregatorConfig,
) -> Result<RunSummary> {
    // Initializing the substrate is the embedding program's job.
    process.init().wrap_err("failed to initialize substrate")?;

    let aggregator = ResultAggregator::new(process.clone(), config.clone(), StdoutSink)?;
    let cases = scenario.test_cases(process.rank());
    let summary = TestRun::new()
        .add_environment(SubstrateGuard::new(process))
        .add_listener(aggregator)
        .run(&cases)?;
    Ok(summary)
}
