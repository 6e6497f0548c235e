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

//! Consensus constants and the short functions built directly on them.
//! Everything here must be agreed on by every node validating extension
//! blocks.

/// Weight of a kernel when counted against the max block weight capacity
pub const KERNEL_WEIGHT: u64 = 2;

/// Weight of an owner signature when counted against the max block weight
/// capacity
pub const OWNER_SIG_WEIGHT: u64 = 1;

/// Weight of an output when counted against the max block weight capacity.
/// Inputs are free, spending shrinks the UTXO set.
pub const OUTPUT_WEIGHT: u64 = 18;

/// Total maximum block weight
pub const MAX_BLOCK_WEIGHT: u64 = 21_000;

/// Weight of a body with the given number of kernels, owner signatures and
/// outputs.
pub fn body_weight(num_kernels: u64, num_owner_sigs: u64, num_outputs: u64) -> u64 {
	num_kernels
		.saturating_mul(KERNEL_WEIGHT)
		.saturating_add(num_owner_sigs.saturating_mul(OWNER_SIG_WEIGHT))
		.saturating_add(num_outputs.saturating_mul(OUTPUT_WEIGHT))
}

/// Whether a body exceeds `max_weight`. Landing exactly on it is fine.
pub fn exceeds_weight(
	num_kernels: u64,
	num_owner_sigs: u64,
	num_outputs: u64,
	max_weight: u64,
) -> bool {
	body_weight(num_kernels, num_owner_sigs, num_outputs) > max_weight
}

/// Whether a body exceeds the consensus maximum block weight.
pub fn exceeds_max_weight(num_kernels: u64, num_owner_sigs: u64, num_outputs: u64) -> bool {
	exceeds_weight(num_kernels, num_owner_sigs, num_outputs, MAX_BLOCK_WEIGHT)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn weights() {
		assert_eq!(body_weight(0, 0, 0), 0);
		assert_eq!(body_weight(1, 0, 0), 2);
		assert_eq!(body_weight(0, 1, 0), 1);
		assert_eq!(body_weight(0, 0, 1), 18);
		assert_eq!(body_weight(1000, 1000, 1000), 21_000);
	}

	#[test]
	fn max_weight_is_inclusive() {
		assert!(!exceeds_max_weight(1000, 1000, 1000));
		assert!(exceeds_max_weight(1000, 1001, 1000));
		assert!(exceeds_max_weight(1001, 1000, 1000));
		assert!(exceeds_max_weight(0, 0, 1167));
		assert!(!exceeds_max_weight(0, 0, 1166));
		assert!(exceeds_max_weight(u64::MAX, 0, 0));
	}
}
