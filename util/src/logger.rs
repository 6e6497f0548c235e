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

//! Logging for every crate of the workspace. Records from modules outside
//! `mweb*` are dropped. Errors of the logging subsystem itself go to stderr
//! and are otherwise ignored.

use crate::Mutex;
use std::{panic, thread};

use backtrace::Backtrace;
use log::{Level, LevelFilter, Record};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::Append;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::{threshold::ThresholdFilter, Filter, Response};

const PATTERN: &str = "{d(%Y%m%d %H:%M:%S%.3f)} {h({l})} {M} - {m}{n}";

const MODULE_PREFIX: &str = "mweb";

/// Log files kept by the rolling appender when none is configured.
const DEFAULT_MAX_FILES: u32 = 32;

/// Whether a logger is installed and which file it writes to.
struct LogState {
	installed: bool,
	log_file: Option<String>,
}

lazy_static! {
	static ref STATE: Mutex<LogState> = Mutex::new(LogState {
		installed: false,
		log_file: None,
	});
}

/// The `[logging]` section of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
	/// whether to log to stdout
	pub log_to_stdout: bool,
	/// stdout threshold
	pub stdout_log_level: Level,
	/// whether to log to a file
	pub log_to_file: bool,
	/// file threshold
	pub file_log_level: Level,
	/// path of the log file
	pub log_file_path: String,
	/// append to an existing log file instead of truncating it
	pub log_file_append: bool,
	/// roll the file over once it reaches this many bytes
	pub log_max_size: Option<u64>,
	/// number of rolled files kept
	pub log_max_files: Option<u32>,
}

impl Default for LoggingConfig {
	fn default() -> LoggingConfig {
		LoggingConfig {
			log_to_stdout: true,
			stdout_log_level: Level::Warn,
			log_to_file: true,
			file_log_level: Level::Info,
			log_file_path: "mweb.log".to_owned(),
			log_file_append: true,
			log_max_size: Some(16 * 1024 * 1024),
			log_max_files: Some(DEFAULT_MAX_FILES),
		}
	}
}

impl LoggingConfig {
	/// Stdout only, at debug level. Used by tests.
	fn for_tests() -> LoggingConfig {
		LoggingConfig {
			log_to_file: false,
			stdout_log_level: Level::Debug,
			..LoggingConfig::default()
		}
	}

	/// Most verbose level any enabled appender accepts.
	fn root_level(&self) -> LevelFilter {
		let level = |on: bool, level: Level| {
			if on {
				level.to_level_filter()
			} else {
				LevelFilter::Off
			}
		};
		level(self.log_to_stdout, self.stdout_log_level)
			.max(level(self.log_to_file, self.file_log_level))
	}
}

/// Keeps records whose module path starts with `prefix`.
#[derive(Debug)]
struct ModuleFilter {
	prefix: &'static str,
}

impl Filter for ModuleFilter {
	fn filter(&self, record: &Record<'_>) -> Response {
		match record.module_path() {
			Some(path) if path.starts_with(self.prefix) => Response::Neutral,
			_ => Response::Reject,
		}
	}
}

fn filtered(name: &str, level: Level, appender: Box<dyn Append>) -> Appender {
	Appender::builder()
		.filter(Box::new(ThresholdFilter::new(level.to_level_filter())))
		.filter(Box::new(ModuleFilter {
			prefix: MODULE_PREFIX,
		}))
		.build(name, appender)
}

/// Plain file appender, or a rolling one when a maximum size is set.
fn file_appender(c: &LoggingConfig) -> Result<Box<dyn Append>, String> {
	let encoder = Box::new(PatternEncoder::new(PATTERN));
	let size = match c.log_max_size {
		None => {
			let appender = FileAppender::builder()
				.append(c.log_file_append)
				.encoder(encoder)
				.build(&c.log_file_path)
				.map_err(|e| e.to_string())?;
			return Ok(Box::new(appender));
		}
		Some(size) => size,
	};
	let roller = FixedWindowRoller::builder()
		.build(
			&format!("{}.{{}}.gz", c.log_file_path),
			c.log_max_files.unwrap_or(DEFAULT_MAX_FILES),
		)
		.map_err(|e| e.to_string())?;
	let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(size)), Box::new(roller));
	let appender = RollingFileAppender::builder()
		.append(c.log_file_append)
		.encoder(encoder)
		.build(&c.log_file_path, Box::new(policy))
		.map_err(|e| e.to_string())?;
	Ok(Box::new(appender))
}

/// log4rs configuration for `c`. A file appender that cannot be opened is
/// reported and left out.
fn build_config(c: &LoggingConfig) -> Result<(Config, bool), String> {
	let mut appenders = vec![];
	if c.log_to_stdout {
		let stdout = ConsoleAppender::builder()
			.encoder(Box::new(PatternEncoder::new(PATTERN)))
			.build();
		appenders.push(filtered("stdout", c.stdout_log_level, Box::new(stdout)));
	}
	let mut to_file = false;
	if c.log_to_file {
		match file_appender(c) {
			Ok(file) => {
				appenders.push(filtered("file", c.file_log_level, file));
				to_file = true;
			}
			Err(e) => eprintln!("logger: cannot open {}: {}", c.log_file_path, e),
		}
	}

	let names: Vec<String> = appenders.iter().map(|a| a.name().to_owned()).collect();
	let root = Root::builder().appenders(names).build(c.root_level());
	let config = Config::builder()
		.appenders(appenders)
		.build(root)
		.map_err(|e| e.to_string())?;
	Ok((config, to_file))
}

/// Install the logger once per process. Later calls do nothing. A logger
/// installed by someone else (another test binary harness) is left alone.
fn install(c: &LoggingConfig) -> bool {
	let mut state = STATE.lock();
	if state.installed {
		return false;
	}
	let (config, to_file) = match build_config(c) {
		Ok(built) => built,
		Err(e) => {
			eprintln!("logger: invalid configuration: {}", e);
			return false;
		}
	};
	if log4rs::init_config(config).is_err() {
		return false;
	}
	state.installed = true;
	if to_file {
		state.log_file = Some(c.log_file_path.clone());
	}
	true
}

/// Initialize logging from the configuration file's `[logging]` section.
/// Without a section nothing is logged, but panics still go through the
/// panic hook.
pub fn init_logger(config: Option<LoggingConfig>) {
	if let Some(c) = config {
		if install(&c) {
			info!(
				"logger: stdout {:?}, file {:?} ({}), root {:?}",
				c.stdout_log_level,
				c.file_log_level,
				c.log_file_path,
				c.root_level()
			);
		}
	}
	log_panics();
}

/// Initialize logging to stdout at debug level, for tests.
pub fn init_test_logger() {
	if install(&LoggingConfig::for_tests()) {
		debug!("logger: test logger installed");
	}
}

/// Route panics through the log, with a backtrace, and point at the log
/// file on stderr.
fn log_panics() {
	panic::set_hook(Box::new(|info| {
		let backtrace = Backtrace::new();
		let current = thread::current();
		let name = current.name().unwrap_or("unnamed");

		let payload = info.payload();
		let msg = payload
			.downcast_ref::<&'static str>()
			.copied()
			.or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
			.unwrap_or("Box<Any>");
		let place = info
			.location()
			.map(|l| format!(" at {}:{}", l.file(), l.line()))
			.unwrap_or_default();

		error!("thread '{}' panicked{}: {}\n{:?}", name, place, msg, backtrace);

		match STATE.lock().log_file.as_ref() {
			Some(file) => eprintln!(
				"thread '{}' panicked{}: {}\nbacktrace written to {}",
				name, place, msg, file
			),
			None => eprintln!("thread '{}' panicked{}: {}\n{:?}", name, place, msg, backtrace),
		}
	}));
}

#[cfg(test)]
mod test {
	use super::*;
	use log::RecordBuilder;

	#[test]
	fn root_level_follows_enabled_appenders() {
		let mut c = LoggingConfig::default();
		assert_eq!(c.root_level(), LevelFilter::Info);
		c.log_to_file = false;
		assert_eq!(c.root_level(), LevelFilter::Warn);
		c.log_to_stdout = false;
		assert_eq!(c.root_level(), LevelFilter::Off);
		assert_eq!(LoggingConfig::for_tests().root_level(), LevelFilter::Debug);
	}

	#[test]
	fn only_engine_modules_pass() {
		let filter = ModuleFilter {
			prefix: MODULE_PREFIX,
		};
		let ours = RecordBuilder::new()
			.args(format_args!("applied"))
			.module_path(Some("mweb_chain::chain"))
			.build();
		assert!(matches!(filter.filter(&ours), Response::Neutral));
		let theirs = RecordBuilder::new()
			.args(format_args!("resized"))
			.module_path(Some("lmdb_zero::env"))
			.build();
		assert!(matches!(filter.filter(&theirs), Response::Reject));
		let anonymous = RecordBuilder::new().args(format_args!("none")).build();
		assert!(matches!(filter.filter(&anonymous), Response::Reject));
	}
}
