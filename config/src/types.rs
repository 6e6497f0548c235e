// Copyright 2021 The Grin Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Public types for config modules

use std::io;
use std::path::PathBuf;

use crate::chain::ChainConfig;
use crate::util::LoggingConfig;

/// Error type wrapping config errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Error with parsing of config file
	#[error("Error parsing configuration file at {0} - {1}")]
	ParseError(String, String),

	/// Error with fileIO while reading config file
	#[error("{1} {0}")]
	FileIOError(String, String),

	/// No file found
	#[error("Configuration file not found: {0}")]
	FileNotFoundError(String),

	/// Error serializing config values
	#[error("Error serializing configuration: {0}")]
	SerializationError(String),
}

impl From<io::Error> for ConfigError {
	fn from(error: io::Error) -> ConfigError {
		ConfigError::FileIOError(
			String::from(""),
			format!("Error loading config file: {}", error),
		)
	}
}

/// The configuration file, along with where it was read from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
	/// Keep track of the file we've read
	pub config_file_path: Option<PathBuf>,
	/// Global member config
	pub members: ConfigMembers,
}

/// What the file holds: one section per concern.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConfigMembers {
	/// Chain state config
	#[serde(default)]
	pub chain: ChainConfig,
	/// Logging config, no logging when absent
	pub logging: Option<LoggingConfig>,
}
