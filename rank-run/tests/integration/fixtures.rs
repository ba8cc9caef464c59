// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::{
    borrow::Cow,
    fmt,
    process::{Command, ExitStatus},
};

/// Environment variables that would change how `rank-run` behaves if inherited.
const SCRUBBED_ENV: &[&str] = &[
    "RANK_RUN_RANKS",
    "RANK_RUN_CONFIG",
    "RANK_RUN_LOG",
    "RANK_RUN_VERBOSE",
    "CARGO_TERM_COLOR",
];

pub(crate) fn scenario_path(name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[derive(Clone, Debug)]
pub(crate) struct RankRunCli {
    args: Vec<String>,
}

impl RankRunCli {
    pub(crate) fn new() -> Self {
        Self {
            args: vec!["--color".to_owned(), "never".to_owned()],
        }
    }

    pub(crate) fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn output(&self) -> RankRunOutput {
        let mut command = Command::new(env!("CARGO_BIN_EXE_rank-run"));
        command.args(&self.args);
        for var in SCRUBBED_ENV {
            command.env_remove(var);
        }
        let output = command.output().expect("failed to execute rank-run");

        RankRunOutput {
            command,
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

pub(crate) struct RankRunOutput {
    pub(crate) command: Command,
    pub(crate) exit_status: ExitStatus,
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

impl RankRunOutput {
    pub(crate) fn exit_code(&self) -> Option<i32> {
        self.exit_status.code()
    }

    pub(crate) fn stdout_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub(crate) fn stderr_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl fmt::Display for RankRunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command: {:?}\nexit code: {:?}\n\
                   --- stdout ---\n{}\n\n--- stderr ---\n{}\n\n",
            self.command,
            self.exit_status.code(),
            self.stdout_as_str(),
            self.stderr_as_str(),
        )
    }
}

// Make Debug output the same as Display output, so failed assertions show everything.
impl fmt::Debug for RankRunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
