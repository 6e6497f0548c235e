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

//! Commands operating on the stored state, outside of any base chain.

use std::fs;
use std::sync::Arc;

use clap::ArgMatches;

use crate::chain::{Chain, Error, HeaderProvider, State};
use crate::config::GlobalConfig;
use crate::core::core::hash::{Hash, Hashed};
use crate::core::core::{Block, Header, PegInCoin, PegOutCoin};
use crate::core::libtx::Crypto;
use crate::core::ser;

/// No base chain to ask, the tool never applies blocks.
struct Offline;

impl HeaderProvider for Offline {
	fn get_header(&self, _hash: &Hash) -> Option<Header> {
		None
	}

	fn get_block(&self, _hash: &Hash) -> Option<Block> {
		None
	}

	fn get_header_and_pegs(
		&self,
		_hash: &Hash,
	) -> Option<(Header, Vec<PegInCoin>, Vec<PegOutCoin>)> {
		None
	}
}

fn verify_snapshot(crypto: &Crypto, file: &str) -> Result<(), Error> {
	let bytes = fs::read(file)?;
	let state: State = ser::deserialize_exact(&bytes)?;
	state.validate(crypto)?;
	println!(
		"Snapshot {} at {} is valid: {} utxos, {} kernels",
		state.header.hash(),
		state.header.height,
		state.utxos.len(),
		state.kernels.len()
	);
	Ok(())
}

fn run(args: &ArgMatches<'_>, config: &GlobalConfig) -> Result<(), Error> {
	let crypto = Crypto::new();
	if let ("verify_snapshot", Some(sub)) = args.subcommand() {
		return verify_snapshot(&crypto, sub.value_of("file").unwrap_or_default());
	}

	let chain = Chain::init(config.members.chain.clone(), crypto, Arc::new(Offline))?;
	match args.subcommand() {
		("status", _) => {
			let head = chain.head_header();
			println!("Head: {} at {}", head.hash(), head.height);
			println!("Outputs: {}, kernels: {}", head.num_txos, head.num_kernels);
			println!("Output root: {}", head.output_root);
			println!("Kernel root: {}", head.kernel_root);
			println!("Leaf set root: {}", head.leafset_root);
		}
		("validate", _) => {
			chain.validate()?;
			println!("State at {} is valid", chain.head_header().height);
		}
		("compact", _) => {
			let pruned = chain.compact()?;
			println!("Compaction done, {} outputs pruned", pruned);
		}
		("snapshot", Some(sub)) => {
			let file = sub.value_of("file").unwrap_or_default();
			let state = chain.snapshot()?;
			fs::write(file, ser::ser_vec(&state)?)?;
			println!(
				"Snapshot at {} written to {}, {} utxos",
				state.header.height,
				file,
				state.utxos.len()
			);
		}
		(cmd, _) => return Err(Error::Other(format!("unknown command {}", cmd))),
	}
	Ok(())
}

/// Run one of the state commands, returning the exit code.
pub fn state_command(args: &ArgMatches<'_>, config: &GlobalConfig) -> i32 {
	match run(args, config) {
		Ok(()) => 0,
		Err(e) => {
			error!("state command failed: {}", e);
			eprintln!("Error: {}", e);
			1
		}
	}
}
