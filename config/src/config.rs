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

//! Configuration file management

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::chain::ChainConfig;
use crate::comments::insert_comments;
use crate::types::{ConfigError, ConfigMembers, GlobalConfig};
use crate::util::LoggingConfig;

/// The default file name to use when trying to derive the config file
/// location
pub const CONFIG_FILE_NAME: &str = "mweb.toml";
/// Directory under the user's home holding the default config and state
pub const MWEB_HOME: &str = ".mweb";
const CHAIN_DATA_DIR: &str = "chain_data";

fn path_str(path: &Path) -> Result<&str, ConfigError> {
	path.to_str().ok_or_else(|| {
		ConfigError::FileIOError(format!("{:?}", path), "Invalid path".to_owned())
	})
}

/// Load the configuration at `config_file_path`, or when none is given
/// the one in the mweb home directory, writing a default one there first
/// if there is none.
pub fn initial_setup(config_file_path: Option<&str>) -> Result<GlobalConfig, ConfigError> {
	if let Some(p) = config_file_path {
		return GlobalConfig::new(p);
	}

	let mweb_path = match dirs::home_dir() {
		Some(mut p) => {
			p.push(MWEB_HOME);
			p
		}
		None => PathBuf::from(MWEB_HOME),
	};
	if !mweb_path.exists() {
		fs::create_dir_all(&mweb_path)?;
	}

	let config_path = mweb_path.join(CONFIG_FILE_NAME);
	if !config_path.exists() {
		let mut default_config = GlobalConfig::default();
		let chain_path = mweb_path.join(CHAIN_DATA_DIR);
		default_config.members.chain.db_root = path_str(&chain_path)?.to_owned();
		if let Some(ref mut logging) = default_config.members.logging {
			logging.log_file_path = path_str(&mweb_path.join("mweb.log"))?.to_owned();
		}
		default_config.write_to_file(path_str(&config_path)?)?;
	}
	GlobalConfig::new(path_str(&config_path)?)
}

impl Default for ConfigMembers {
	fn default() -> ConfigMembers {
		ConfigMembers {
			chain: ChainConfig::default(),
			logging: Some(LoggingConfig::default()),
		}
	}
}

impl Default for GlobalConfig {
	fn default() -> GlobalConfig {
		GlobalConfig {
			config_file_path: None,
			members: ConfigMembers::default(),
		}
	}
}

impl GlobalConfig {
	/// Requires the path to a config file
	pub fn new(file_path: &str) -> Result<GlobalConfig, ConfigError> {
		let config_file = PathBuf::from(file_path);
		if !config_file.exists() {
			return Err(ConfigError::FileNotFoundError(file_path.to_owned()));
		}

		let mut contents = String::new();
		File::open(&config_file)?.read_to_string(&mut contents)?;
		let members: ConfigMembers = toml::from_str(&contents)
			.map_err(|e| ConfigError::ParseError(file_path.to_owned(), format!("{}", e)))?;

		Ok(GlobalConfig {
			config_file_path: Some(config_file),
			members,
		})
	}

	/// Serialize config
	pub fn ser_config(&self) -> Result<String, ConfigError> {
		toml::to_string(&self.members).map_err(|e| ConfigError::SerializationError(format!("{}", e)))
	}

	/// Write configuration to a file
	pub fn write_to_file(&mut self, name: &str) -> Result<(), ConfigError> {
		let conf_out = insert_comments(self.ser_config()?);
		let mut file = File::create(name)?;
		file.write_all(conf_out.as_bytes())?;
		self.config_file_path = Some(PathBuf::from(name));
		Ok(())
	}
}
