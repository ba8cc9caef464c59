// Copyright (c) The rank-listener Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the result aggregator.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::Utf8Path;
use config::{Config, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::fmt;

/// Configuration for a [`ResultAggregator`](crate::aggregator::ResultAggregator).
///
/// Every rank must be constructed with the same configuration: the coordinator decodes what the
/// other ranks encode.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub struct AggregatorConfig {
    /// How text fields are framed on the wire.
    #[serde(default)]
    pub text_framing: TextFraming,

    /// Whether to style the status keyword of each printed result.
    #[serde(default)]
    pub colorize: bool,
}

impl AggregatorConfig {
    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from `config_file` layered on top of the default config.
    ///
    /// If `config_file` is `None`, returns the default config.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let mut builder = Self::make_default_config();
        let attribution = match config_file {
            Some(config_file) => {
                builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml));
                config_file
            }
            None => Utf8Path::new("<default config>"),
        };

        Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(attribution, kind))
    }

    /// Parses the config from a TOML string layered on top of the default config.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigParseError> {
        let builder = Self::make_default_config().add_source(File::from_str(contents, FileFormat::Toml));
        Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new("<inline config>", kind))
    }

    /// Sets the text framing.
    pub fn with_text_framing(mut self, text_framing: TextFraming) -> Self {
        self.text_framing = text_framing;
        self
    }

    /// Sets whether output is styled.
    pub fn with_colorize(mut self, colorize: bool) -> Self {
        self.colorize = colorize;
        self
    }

    fn make_default_config() -> config::ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: config::ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))
    }
}

/// How variable-length text is framed on the wire.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum TextFraming {
    /// A trailing zero byte is sent after the text and counted in the length.
    ///
    /// The receiver strips that one trailing zero byte. Zero bytes inside the text survive.
    #[default]
    NulTerminated,

    /// Exactly the text bytes are sent.
    LengthOnly,
}

impl TextFraming {
    /// Returns the string used for this framing in config files.
    pub fn as_str(self) -> &'static str {
        match self {
            TextFraming::NulTerminated => "nul-terminated",
            TextFraming::LengthOnly => "length-only",
        }
    }

    pub(crate) fn encode(self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len() + 1);
        bytes.extend_from_slice(text.as_bytes());
        if self == TextFraming::NulTerminated {
            bytes.push(0);
        }
        bytes
    }

    pub(crate) fn decode(self, bytes: &[u8]) -> String {
        let text = match self {
            TextFraming::NulTerminated => bytes.strip_suffix(&[0u8]).unwrap_or(bytes),
            TextFraming::LengthOnly => bytes,
        };
        String::from_utf8_lossy(text).into_owned()
    }
}

impl fmt::Display for TextFraming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
