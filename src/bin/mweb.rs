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

//! Main for building the binary of the MWEB state engine tool.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use mweb_chain as chain;
use mweb_config as config;
use mweb_core as core;
use mweb_util as util;

mod cmd;

use clap::{App, Arg, SubCommand};

fn main() {
	let exit_code = real_main();
	std::process::exit(exit_code);
}

fn real_main() -> i32 {
	let args = App::new("mweb")
		.version(crate_version!())
		.about("Inspect and maintain the state of a MimbleWimble extension block.")
		.arg(
			Arg::with_name("config")
				.short("c")
				.long("config")
				.value_name("FILE")
				.help("Use a custom configuration file instead of ~/.mweb/mweb.toml")
				.takes_value(true),
		)
		.subcommand(
			SubCommand::with_name("config")
				.about("Generate a configuration mweb.toml file in the current directory"),
		)
		.subcommand(SubCommand::with_name("status").about("Print the header the state is at"))
		.subcommand(
			SubCommand::with_name("validate")
				.about("Check roots, signatures, range proofs and sums of the whole state"),
		)
		.subcommand(
			SubCommand::with_name("compact")
				.about("Prune spent outputs from the output and range proof MMRs"),
		)
		.subcommand(
			SubCommand::with_name("snapshot")
				.about("Write a snapshot of the state to a file")
				.arg(Arg::with_name("file").required(true).index(1)),
		)
		.subcommand(
			SubCommand::with_name("verify_snapshot")
				.about("Validate a snapshot file against the header it carries")
				.arg(Arg::with_name("file").required(true).index(1)),
		)
		.get_matches();

	match args.subcommand() {
		("config", _) => return cmd::config_command(config::CONFIG_FILE_NAME),
		("", _) => {
			println!("{}", args.usage());
			return 0;
		}
		_ => {}
	}

	let global_config = match config::initial_setup(args.value_of("config")) {
		Ok(c) => c,
		Err(e) => {
			eprintln!("Error loading configuration: {}", e);
			return 1;
		}
	};
	util::init_logger(global_config.members.logging.clone());
	info!(
		"Using configuration file at {:?}",
		global_config.config_file_path
	);

	cmd::state_command(&args, &global_config)
}
