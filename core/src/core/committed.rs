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

//! Kernel sums: the balance equation tying output and input commitments to
//! kernel excesses. For a body,
//!
//! ```text
//! sum(outputs) - sum(inputs) == sum(excess) + offset*G + (pegin - fee - pegout)*H
//! ```
//!
//! The transparent part is folded onto whichever side keeps it positive.

use crate::core::transaction::{Error, Kernel, TxBody};
use crate::keychain::BlindingFactor;
use crate::libtx::Crypto;
use crate::util::secp::pedersen::Commitment;

/// `fee + pegout - pegin` over the kernels.
fn net_supply_spent(kernels: &[Kernel]) -> i128 {
	kernels.iter().fold(0i128, |acc, k| {
		let pegout = k.pegout.as_ref().map(|p| p.amount).unwrap_or(0);
		acc + i128::from(k.fee) + i128::from(pegout) - i128::from(k.pegin)
	})
}

fn transparent(crypto: &Crypto, amount: i128) -> Result<Commitment, Error> {
	if amount <= 0 || amount > i128::from(u64::MAX) {
		return Err(Error::BlockSums);
	}
	Ok(crypto.commit_transparent(amount as u64)?)
}

/// Kernel excesses plus the offset commitment.
fn kernel_side(
	crypto: &Crypto,
	kernels: &[Kernel],
	offset: &BlindingFactor,
	supply: u64,
) -> Result<Commitment, Error> {
	let mut commits: Vec<Commitment> = kernels.iter().map(|k| k.excess).collect();
	if !offset.is_zero() {
		commits.push(crypto.commit_blinded(0, offset)?);
	}
	if supply > 0 {
		commits.push(crypto.commit_transparent(supply)?);
	}
	Ok(crypto.add_commitments(&commits, &[])?)
}

fn validate_sums(crypto: &Crypto, body: &TxBody, offset: &BlindingFactor) -> Result<(), Error> {
	let mut inputs: Vec<Commitment> = body.inputs().iter().map(|i| i.commit).collect();
	let mut outputs: Vec<Commitment> = body.outputs().iter().map(|o| o.commit).collect();

	let net = net_supply_spent(body.kernels());
	if net > 0 {
		outputs.push(transparent(crypto, net)?);
	} else if net < 0 {
		inputs.push(transparent(crypto, -net)?);
	}

	let utxo_sum = crypto.add_commitments(&outputs, &inputs)?;
	let kernel_sum = kernel_side(crypto, body.kernels(), offset, 0)?;
	if utxo_sum != kernel_sum {
		return Err(Error::BlockSums);
	}
	Ok(())
}

/// Balance of a transaction against its own kernel offset.
pub fn validate_for_tx(
	crypto: &Crypto,
	body: &TxBody,
	kernel_offset: &BlindingFactor,
) -> Result<(), Error> {
	validate_sums(crypto, body, kernel_offset)
}

/// Balance of a block. Headers carry the cumulative offset, the block's own
/// share is the difference with the previous header's.
pub fn validate_for_block(
	crypto: &Crypto,
	body: &TxBody,
	total_offset: &BlindingFactor,
	prev_total_offset: &BlindingFactor,
) -> Result<(), Error> {
	let offset = crypto.add_blinding_factors(&[total_offset.clone()], &[prev_total_offset.clone()])?;
	validate_sums(crypto, body, &offset)
}

/// Balance of a whole chain state: every live output against every kernel
/// ever included. Supply is tracked kernel by kernel in order, a peg-out or
/// fee taking it below zero fails right there.
pub fn validate_state(
	crypto: &Crypto,
	utxos: &[Commitment],
	kernels: &[Kernel],
	total_offset: &BlindingFactor,
) -> Result<(), Error> {
	let mut supply: u64 = 0;
	for kernel in kernels {
		supply = supply.checked_add(kernel.pegin).ok_or(Error::BlockSums)?;
		supply = supply.checked_sub(kernel.fee).ok_or(Error::BlockSums)?;
		if let Some(ref pegout) = kernel.pegout {
			supply = supply.checked_sub(pegout.amount).ok_or(Error::BlockSums)?;
		}
	}

	let utxo_sum = crypto.add_commitments(utxos, &[])?;
	let kernel_sum = kernel_side(crypto, kernels, total_offset, supply)?;
	if utxo_sum != kernel_sum {
		debug!(
			"validate_state: mismatch over {} utxos, {} kernels, supply {}",
			utxos.len(),
			kernels.len(),
			supply
		);
		return Err(Error::BlockSums);
	}
	Ok(())
}
