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

//! Transactions

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::consensus;
use crate::core::committed;
use crate::core::hash::{DefaultHashable, Hash, HashWriter, Hashed};
use crate::core::owner_sum;
use crate::keychain::{self, BlindingFactor};
use crate::libtx::{self, Crypto};
use crate::ser::{self, Readable, Reader, Writeable, Writer};
use crate::util::secp::key::PublicKey;
use crate::util::secp::pedersen::{Commitment, RangeProof};
use crate::util::secp::{self, Signature};

/// Errors thrown by transaction and block validation. Every variant but the
/// last three is a consensus failure.
#[derive(Clone, Eq, Debug, PartialEq, thiserror::Error)]
pub enum Error {
	/// An input spends an output created in the same body, or an output
	/// commitment appears twice.
	#[error("cut-through violation")]
	CutThrough,
	/// Body is heavier than the consensus maximum.
	#[error("block weight exceeded")]
	BlockWeight,
	/// Kernel sums do not balance the commitment sums.
	#[error("kernel sums mismatch")]
	BlockSums,
	/// Kernel signature verification failed.
	#[error("invalid kernel signature")]
	KernelSignature,
	/// Range proof verification failed.
	#[error("invalid range proof")]
	RangeProof,
	/// An output sender signature or owner signature failed to verify.
	#[error("invalid owner signature")]
	OwnerSignature,
	/// Owner keys do not balance.
	#[error("owner sums mismatch")]
	OwnerSums,
	/// Peg-in kernels don't match the peg-ins expected by the base chain.
	#[error("peg-in mismatch")]
	PegInMismatch,
	/// Peg-out kernels don't match the peg-outs expected by the base chain.
	#[error("peg-out mismatch")]
	PegOutMismatch,
	/// A kernel is locked until a height past the block's
	#[error("kernel locked until height {0}")]
	KernelLockHeight(u64),
	/// Underlying secp lib error
	#[error("secp error: {0:?}")]
	Secp(secp::Error),
	/// Underlying keychain related error
	#[error("keychain error: {0}")]
	Keychain(keychain::Error),
	/// Error originating from an invalid serialization
	#[error("serialization error: {0}")]
	Serialization(ser::Error),
}

impl Error {
	/// Whether the error means the data is invalid, as opposed to a failure
	/// of the machinery checking it.
	pub fn is_consensus(&self) -> bool {
		match self {
			Error::Secp(_) | Error::Keychain(_) | Error::Serialization(_) => false,
			_ => true,
		}
	}
}

impl From<secp::Error> for Error {
	fn from(e: secp::Error) -> Error {
		Error::Secp(e)
	}
}

impl From<keychain::Error> for Error {
	fn from(e: keychain::Error) -> Error {
		Error::Keychain(e)
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::Serialization(e)
	}
}

impl From<libtx::Error> for Error {
	fn from(e: libtx::Error) -> Error {
		match e {
			libtx::Error::Secp(e) => Error::Secp(e),
			libtx::Error::Keychain(e) => Error::Keychain(e),
		}
	}
}

bitflags! {
	/// Options for an output's structure or use
	pub struct OutputFeatures: u8 {
		/// Output created by a peg-in from the base chain
		const PEGGED_IN = 0x01;
	}
}

bitflags! {
	/// Which optional fields a kernel carries. Derived from the fields, never
	/// stored apart from them.
	pub struct KernelFeatures: u8 {
		/// Pays a fee
		const FEE = 0x01;
		/// Pegs value in from the base chain
		const PEGIN = 0x02;
		/// Pegs value out to the base chain
		const PEGOUT = 0x04;
		/// Only valid from a given height on
		const HEIGHT_LOCK = 0x08;
	}
}

fn commitment_order(a: &Commitment, b: &Commitment) -> Ordering {
	a.0[..].cmp(&b.0[..])
}

/// Value moved into the extension block, as recorded by the base chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PegInCoin {
	/// Amount pegged in
	pub amount: u64,
	/// Hash of the kernel claiming it
	pub kernel_id: Hash,
}

impl Writeable for PegInCoin {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.amount)?;
		self.kernel_id.write(writer)
	}
}

impl Readable for PegInCoin {
	fn read<R: Reader>(reader: &mut R) -> Result<PegInCoin, ser::Error> {
		Ok(PegInCoin {
			amount: reader.read_u64()?,
			kernel_id: Hash::read(reader)?,
		})
	}
}

/// Value moved out to the base chain, and the script it is paid to there.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PegOutCoin {
	/// Amount pegged out
	pub amount: u64,
	/// Base chain output script
	pub script_pubkey: Vec<u8>,
}

impl Writeable for PegOutCoin {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.amount)?;
		writer.write_bytes(&self.script_pubkey)
	}
}

impl Readable for PegOutCoin {
	fn read<R: Reader>(reader: &mut R) -> Result<PegOutCoin, ser::Error> {
		Ok(PegOutCoin {
			amount: reader.read_u64()?,
			script_pubkey: reader.read_bytes_len_prefix()?,
		})
	}
}

/// A proof that a transaction sums to zero. Includes both the transaction's
/// Pedersen commitment and the signature, that guarantees that the
/// commitment amounts to zero. Fee, peg-in and peg-out amounts are
/// transparent, committed to in the signature message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
	/// Fee paid, 0 for none
	pub fee: u64,
	/// Amount pegged in, 0 for none
	pub pegin: u64,
	/// Peg-out, if any
	pub pegout: Option<PegOutCoin>,
	/// Height from which the kernel is valid, 0 for none
	pub lock_height: u64,
	/// Remainder of the sum of all transaction commitments. If the
	/// transaction is well formed, amounts components should sum to zero
	/// and the excess is hence a valid public key (sum of the commitment
	/// public keys).
	pub excess: Commitment,
	/// The signature proving the excess is a valid public key, which signs
	/// the transaction fee.
	pub signature: Signature,
}

impl DefaultHashable for Kernel {}

impl Kernel {
	/// Build and sign a kernel with excess `excess_blind*G`.
	pub fn create(
		crypto: &Crypto,
		excess_blind: &BlindingFactor,
		fee: u64,
		pegin: u64,
		pegout: Option<PegOutCoin>,
		lock_height: u64,
	) -> Result<Kernel, Error> {
		let excess = crypto.commit_blinded(0, excess_blind)?;
		let msg = kernel_msg_hash(fee, pegin, &pegout, lock_height, &excess);
		let signature = crypto.build_signature(excess_blind, &msg)?;
		Ok(Kernel {
			fee,
			pegin,
			pegout,
			lock_height,
			excess,
			signature,
		})
	}

	/// Features implied by which fields are set.
	pub fn features(&self) -> KernelFeatures {
		kernel_features(self.fee, self.pegin, &self.pegout, self.lock_height)
	}

	/// The message the excess signs: everything but the signature.
	pub fn msg_hash(&self) -> Hash {
		kernel_msg_hash(
			self.fee,
			self.pegin,
			&self.pegout,
			self.lock_height,
			&self.excess,
		)
	}

	/// The peg-in this kernel claims, if any.
	pub fn pegin_coin(&self) -> Option<PegInCoin> {
		if self.pegin > 0 {
			Some(PegInCoin {
				amount: self.pegin,
				kernel_id: self.hash(),
			})
		} else {
			None
		}
	}

	/// The excess commitment.
	pub fn excess(&self) -> Commitment {
		self.excess
	}

	/// Verify every kernel signature in one batch.
	pub fn batch_sig_verify(crypto: &Crypto, kernels: &[Kernel]) -> Result<(), Error> {
		let mut sigs = Vec::with_capacity(kernels.len());
		for k in kernels {
			let pubkey = crypto
				.to_public_key(&k.excess)
				.map_err(|_| Error::KernelSignature)?;
			sigs.push((k.signature, pubkey, k.msg_hash()));
		}
		if !crypto.verify_signatures(&sigs) {
			return Err(Error::KernelSignature);
		}
		Ok(())
	}
}

fn kernel_features(
	fee: u64,
	pegin: u64,
	pegout: &Option<PegOutCoin>,
	lock_height: u64,
) -> KernelFeatures {
	let mut features = KernelFeatures::empty();
	if fee > 0 {
		features |= KernelFeatures::FEE;
	}
	if pegin > 0 {
		features |= KernelFeatures::PEGIN;
	}
	if pegout.is_some() {
		features |= KernelFeatures::PEGOUT;
	}
	if lock_height > 0 {
		features |= KernelFeatures::HEIGHT_LOCK;
	}
	features
}

fn write_kernel_fields<W: Writer>(
	writer: &mut W,
	fee: u64,
	pegin: u64,
	pegout: &Option<PegOutCoin>,
	lock_height: u64,
	excess: &Commitment,
) -> Result<(), ser::Error> {
	let features = kernel_features(fee, pegin, pegout, lock_height);
	writer.write_u8(features.bits())?;
	if features.contains(KernelFeatures::FEE) {
		writer.write_u64(fee)?;
	}
	if features.contains(KernelFeatures::PEGIN) {
		writer.write_u64(pegin)?;
	}
	if let Some(ref pegout) = pegout {
		pegout.write(writer)?;
	}
	if features.contains(KernelFeatures::HEIGHT_LOCK) {
		writer.write_u64(lock_height)?;
	}
	excess.write(writer)
}

fn kernel_msg_hash(
	fee: u64,
	pegin: u64,
	pegout: &Option<PegOutCoin>,
	lock_height: u64,
	excess: &Commitment,
) -> Hash {
	let mut hasher = HashWriter::default();
	// writing into a HashWriter never fails
	let _ = write_kernel_fields(&mut hasher, fee, pegin, pegout, lock_height, excess);
	hasher.into_hash()
}

impl Writeable for Kernel {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		write_kernel_fields(
			writer,
			self.fee,
			self.pegin,
			&self.pegout,
			self.lock_height,
			&self.excess,
		)?;
		self.signature.write(writer)
	}
}

fn read_nonzero<R: Reader>(reader: &mut R) -> Result<u64, ser::Error> {
	match reader.read_u64()? {
		0 => Err(ser::Error::CorruptedData),
		n => Ok(n),
	}
}

impl Readable for Kernel {
	fn read<R: Reader>(reader: &mut R) -> Result<Kernel, ser::Error> {
		let features =
			KernelFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		let fee = if features.contains(KernelFeatures::FEE) {
			read_nonzero(reader)?
		} else {
			0
		};
		let pegin = if features.contains(KernelFeatures::PEGIN) {
			read_nonzero(reader)?
		} else {
			0
		};
		let pegout = if features.contains(KernelFeatures::PEGOUT) {
			Some(PegOutCoin::read(reader)?)
		} else {
			None
		};
		let lock_height = if features.contains(KernelFeatures::HEIGHT_LOCK) {
			read_nonzero(reader)?
		} else {
			0
		};
		Ok(Kernel {
			fee,
			pegin,
			pegout,
			lock_height,
			excess: Commitment::read(reader)?,
			signature: Signature::read(reader)?,
		})
	}
}

/// A transaction input, spending the most recent live output with the same
/// commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input {
	/// Features of the output being spent
	pub features: OutputFeatures,
	/// Commitment of the output being spent
	pub commit: Commitment,
	/// Sender key of the output being spent
	pub pubkey: PublicKey,
}

impl DefaultHashable for Input {}

impl Input {
	/// Input spending `output`.
	pub fn spending(output: &Output) -> Input {
		Input {
			features: output.features,
			commit: output.commit,
			pubkey: output.sender_pubkey,
		}
	}

	/// Commitment of the spent output
	pub fn commitment(&self) -> Commitment {
		self.commit
	}
}

impl Writeable for Input {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)?;
		self.pubkey.write(writer)
	}
}

impl Readable for Input {
	fn read<R: Reader>(reader: &mut R) -> Result<Input, ser::Error> {
		let features =
			OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		Ok(Input {
			features,
			commit: Commitment::read(reader)?,
			pubkey: PublicKey::read(reader)?,
		})
	}
}

/// Output for a transaction, defining the new ownership of coins that are
/// being transferred. The commitment is a blinded value for the output while
/// the range proof guarantees the commitment includes a positive value
/// without overflow and the ownership of the private key. The sender key
/// signs everything else.
#[derive(Debug, Clone, Copy)]
pub struct Output {
	/// Options for an output's structure or use
	pub features: OutputFeatures,
	/// The homomorphic commitment representing the output amount
	pub commit: Commitment,
	/// Key of the party that created the output
	pub sender_pubkey: PublicKey,
	/// Key of the party the output is paid to
	pub receiver_pubkey: PublicKey,
	/// A proof that the commitment is in the right range
	pub proof: RangeProof,
	/// Sender signature over the output message
	pub signature: Signature,
}

impl PartialEq for Output {
	fn eq(&self, other: &Output) -> bool {
		self.features == other.features
			&& self.commit == other.commit
			&& self.sender_pubkey == other.sender_pubkey
			&& self.receiver_pubkey == other.receiver_pubkey
			&& self.proof.proof[..self.proof.plen] == other.proof.proof[..other.proof.plen]
			&& self.signature == other.signature
	}
}

impl Eq for Output {}

impl DefaultHashable for Output {}

impl Output {
	/// Commitment for the output
	pub fn commitment(&self) -> Commitment {
		self.commit
	}

	/// Build and sign an output. `sender_key` is the secret behind the
	/// sender public key.
	pub fn create(
		crypto: &Crypto,
		features: OutputFeatures,
		commit: Commitment,
		sender_key: &BlindingFactor,
		receiver_pubkey: PublicKey,
		proof: RangeProof,
	) -> Result<Output, Error> {
		let sender_pubkey = crypto.calculate_public_key(sender_key)?;
		let msg = OutputMessage {
			features,
			commit: &commit,
			sender_pubkey: &sender_pubkey,
			receiver_pubkey: &receiver_pubkey,
			proof_hash: proof_hash(&proof),
		}
		.hash();
		let signature = crypto.build_signature(sender_key, &msg)?;
		Ok(Output {
			features,
			commit,
			sender_pubkey,
			receiver_pubkey,
			proof,
			signature,
		})
	}

	fn message(&self) -> OutputMessage<'_> {
		OutputMessage {
			features: self.features,
			commit: &self.commit,
			sender_pubkey: &self.sender_pubkey,
			receiver_pubkey: &self.receiver_pubkey,
			proof_hash: proof_hash(&self.proof),
		}
	}

	/// Message signed by the sender key.
	pub fn msg_hash(&self) -> Hash {
		self.message().hash()
	}

	/// Payload of the output MMR leaf: the output with its proof replaced by
	/// the proof hash. The proof itself goes to the range proof MMR.
	pub fn mmr_data(&self) -> Result<Vec<u8>, ser::Error> {
		ser::ser_vec(&(self.message(), self.signature))
	}

	/// Payload of the range proof MMR leaf.
	pub fn proof_data(&self) -> Result<Vec<u8>, ser::Error> {
		ser::ser_vec(&self.proof)
	}
}

fn proof_hash(proof: &RangeProof) -> Hash {
	let mut hasher = HashWriter::default();
	let _ = proof.write(&mut hasher);
	hasher.into_hash()
}

/// Everything in an output but the proof (hashed) and the signature.
struct OutputMessage<'a> {
	features: OutputFeatures,
	commit: &'a Commitment,
	sender_pubkey: &'a PublicKey,
	receiver_pubkey: &'a PublicKey,
	proof_hash: Hash,
}

impl<'a> DefaultHashable for OutputMessage<'a> {}

impl<'a> Writeable for OutputMessage<'a> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)?;
		self.sender_pubkey.write(writer)?;
		self.receiver_pubkey.write(writer)?;
		self.proof_hash.write(writer)
	}
}

impl Writeable for Output {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u8(self.features.bits())?;
		self.commit.write(writer)?;
		self.sender_pubkey.write(writer)?;
		self.receiver_pubkey.write(writer)?;
		self.proof.write(writer)?;
		self.signature.write(writer)
	}
}

impl Readable for Output {
	fn read<R: Reader>(reader: &mut R) -> Result<Output, ser::Error> {
		let features =
			OutputFeatures::from_bits(reader.read_u8()?).ok_or(ser::Error::CorruptedData)?;
		Ok(Output {
			features,
			commit: Commitment::read(reader)?,
			sender_pubkey: PublicKey::read(reader)?,
			receiver_pubkey: PublicKey::read(reader)?,
			proof: RangeProof::read(reader)?,
			signature: Signature::read(reader)?,
		})
	}
}

/// A message signed by an owner key, carried alongside a body to prove
/// control of that key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedMessage {
	/// Hash of the signed message
	pub msg_hash: Hash,
	/// Signing key
	pub pubkey: PublicKey,
	/// Signature
	pub signature: Signature,
}

impl DefaultHashable for SignedMessage {}

impl Writeable for SignedMessage {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.msg_hash.write(writer)?;
		self.pubkey.write(writer)?;
		self.signature.write(writer)
	}
}

impl Readable for SignedMessage {
	fn read<R: Reader>(reader: &mut R) -> Result<SignedMessage, ser::Error> {
		Ok(SignedMessage {
			msg_hash: Hash::read(reader)?,
			pubkey: PublicKey::read(reader)?,
			signature: Signature::read(reader)?,
		})
	}
}

/// Remove every input/output pair sharing a commitment. Duplicates are
/// matched one for one, everything left keeps its relative order. Returns
/// the number of pairs removed.
pub fn cut_through(inputs: &mut Vec<Input>, outputs: &mut Vec<Output>) -> usize {
	let mut outputs_left: HashMap<[u8; 33], usize> = HashMap::new();
	for out in outputs.iter() {
		*outputs_left.entry(out.commit.0).or_insert(0) += 1;
	}

	let mut matched: HashMap<[u8; 33], usize> = HashMap::new();
	inputs.retain(|inp| match outputs_left.get_mut(&inp.commit.0) {
		Some(n) if *n > 0 => {
			*n -= 1;
			*matched.entry(inp.commit.0).or_insert(0) += 1;
			false
		}
		_ => true,
	});

	let removed = matched.values().sum();
	outputs.retain(|out| match matched.get_mut(&out.commit.0) {
		Some(n) if *n > 0 => {
			*n -= 1;
			false
		}
		_ => true,
	});
	removed
}

/// Fails with `CutThrough` if any output commitment appears twice or any
/// input spends an output of the same body.
pub fn verify_cut_through(inputs: &[Input], outputs: &[Output]) -> Result<(), Error> {
	let mut commits = HashMap::with_capacity(outputs.len());
	for out in outputs {
		if commits.insert(out.commit.0, ()).is_some() {
			return Err(Error::CutThrough);
		}
	}
	if inputs.iter().any(|inp| commits.contains_key(&inp.commit.0)) {
		return Err(Error::CutThrough);
	}
	Ok(())
}

/// Inputs, outputs, kernels and owner signatures, in canonical order: inputs
/// and outputs by commitment, kernels and signatures by hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxBody {
	inputs: Vec<Input>,
	outputs: Vec<Output>,
	kernels: Vec<Kernel>,
	owner_sigs: Vec<SignedMessage>,
}

impl DefaultHashable for TxBody {}

impl TxBody {
	/// Body holding the provided parts, sorted.
	pub fn new(
		inputs: Vec<Input>,
		outputs: Vec<Output>,
		kernels: Vec<Kernel>,
		owner_sigs: Vec<SignedMessage>,
	) -> TxBody {
		let mut body = TxBody {
			inputs,
			outputs,
			kernels,
			owner_sigs,
		};
		body.sort();
		body
	}

	/// Body with nothing in it.
	pub fn empty() -> TxBody {
		TxBody::default()
	}

	/// Stable sort of every list into canonical order.
	fn sort(&mut self) {
		self.inputs
			.sort_by(|a, b| commitment_order(&a.commit, &b.commit));
		self.outputs
			.sort_by(|a, b| commitment_order(&a.commit, &b.commit));
		self.kernels.sort_by_cached_key(|k| k.hash());
		self.owner_sigs.sort_by_cached_key(|s| s.hash());
	}

	/// Whether there is nothing in this body.
	pub fn is_empty(&self) -> bool {
		self.inputs.is_empty()
			&& self.outputs.is_empty()
			&& self.kernels.is_empty()
			&& self.owner_sigs.is_empty()
	}

	/// Inputs
	pub fn inputs(&self) -> &[Input] {
		&self.inputs
	}

	/// Outputs
	pub fn outputs(&self) -> &[Output] {
		&self.outputs
	}

	/// Kernels
	pub fn kernels(&self) -> &[Kernel] {
		&self.kernels
	}

	/// Owner signatures
	pub fn owner_sigs(&self) -> &[SignedMessage] {
		&self.owner_sigs
	}

	/// Take the parts back.
	pub fn into_parts(self) -> (Vec<Input>, Vec<Output>, Vec<Kernel>, Vec<SignedMessage>) {
		(self.inputs, self.outputs, self.kernels, self.owner_sigs)
	}

	/// Consensus weight.
	pub fn weight(&self) -> u64 {
		consensus::body_weight(
			self.kernels.len() as u64,
			self.owner_sigs.len() as u64,
			self.outputs.len() as u64,
		)
	}

	/// Total fees paid by the kernels.
	pub fn fee(&self) -> u64 {
		self.kernels
			.iter()
			.fold(0u64, |acc, k| acc.saturating_add(k.fee))
	}

	/// Peg-ins claimed by the kernels.
	pub fn pegins(&self) -> Vec<PegInCoin> {
		self.kernels.iter().filter_map(|k| k.pegin_coin()).collect()
	}

	/// Peg-outs made by the kernels.
	pub fn pegouts(&self) -> Vec<PegOutCoin> {
		self.kernels.iter().filter_map(|k| k.pegout.clone()).collect()
	}

	/// Validates all relevant parts of a body for consistency: weight,
	/// cut-through, kernel signatures, range proofs and owner signatures.
	/// Sums are checked by the enclosing transaction or block.
	pub fn validate(&self, crypto: &Crypto) -> Result<(), Error> {
		if consensus::exceeds_max_weight(
			self.kernels.len() as u64,
			self.owner_sigs.len() as u64,
			self.outputs.len() as u64,
		) {
			return Err(Error::BlockWeight);
		}
		verify_cut_through(&self.inputs, &self.outputs)?;
		Kernel::batch_sig_verify(crypto, &self.kernels)?;
		self.verify_range_proofs(crypto)?;
		self.verify_owner_signatures(crypto)?;
		Ok(())
	}

	fn verify_range_proofs(&self, crypto: &Crypto) -> Result<(), Error> {
		let proofs: Vec<(Commitment, RangeProof)> =
			self.outputs.iter().map(|o| (o.commit, o.proof)).collect();
		if !crypto.verify_range_proofs(&proofs) {
			return Err(Error::RangeProof);
		}
		Ok(())
	}

	fn verify_owner_signatures(&self, crypto: &Crypto) -> Result<(), Error> {
		let mut sigs: Vec<(Signature, PublicKey, Hash)> =
			Vec::with_capacity(self.outputs.len() + self.owner_sigs.len());
		for out in &self.outputs {
			sigs.push((out.signature, out.sender_pubkey, out.msg_hash()));
		}
		for sig in &self.owner_sigs {
			sigs.push((sig.signature, sig.pubkey, sig.msg_hash));
		}
		if !crypto.verify_signatures(&sigs) {
			return Err(Error::OwnerSignature);
		}
		Ok(())
	}
}

impl Writeable for TxBody {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.inputs.write(writer)?;
		self.outputs.write(writer)?;
		self.kernels.write(writer)?;
		self.owner_sigs.write(writer)
	}
}

impl Readable for TxBody {
	fn read<R: Reader>(reader: &mut R) -> Result<TxBody, ser::Error> {
		let inputs = Vec::<Input>::read(reader)?;
		let outputs = Vec::<Output>::read(reader)?;
		let kernels = Vec::<Kernel>::read(reader)?;
		let owner_sigs = Vec::<SignedMessage>::read(reader)?;
		Ok(TxBody::new(inputs, outputs, kernels, owner_sigs))
	}
}

/// A transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
	/// The kernel "offset" k2, excess is k1G after splitting the key k = k1 + k2
	pub kernel_offset: BlindingFactor,
	/// Offset balancing the owner keys
	pub owner_offset: BlindingFactor,
	/// The transaction body
	pub body: TxBody,
}

impl DefaultHashable for Transaction {}

impl fmt::Display for Transaction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"tx {} ({} in, {} out, {} kern)",
			self.hash(),
			self.body.inputs.len(),
			self.body.outputs.len(),
			self.body.kernels.len()
		)
	}
}

impl Transaction {
	/// Creates a new transaction.
	pub fn new(kernel_offset: BlindingFactor, owner_offset: BlindingFactor, body: TxBody) -> Transaction {
		Transaction {
			kernel_offset,
			owner_offset,
			body,
		}
	}

	/// The transaction with nothing in it and zero offsets.
	pub fn empty() -> Transaction {
		Transaction::default()
	}

	/// Inputs
	pub fn inputs(&self) -> &[Input] {
		self.body.inputs()
	}

	/// Outputs
	pub fn outputs(&self) -> &[Output] {
		self.body.outputs()
	}

	/// Kernels
	pub fn kernels(&self) -> &[Kernel] {
		self.body.kernels()
	}

	/// Validates all relevant parts of a fully built transaction: the body
	/// itself, then kernel sums and owner sums.
	pub fn validate(&self, crypto: &Crypto) -> Result<(), Error> {
		self.body.validate(crypto)?;
		committed::validate_for_tx(crypto, &self.body, &self.kernel_offset)?;
		owner_sum::validate(crypto, &self.body, &self.owner_offset)?;
		Ok(())
	}
}

impl Writeable for Transaction {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		self.kernel_offset.write(writer)?;
		self.owner_offset.write(writer)?;
		self.body.write(writer)
	}
}

impl Readable for Transaction {
	fn read<R: Reader>(reader: &mut R) -> Result<Transaction, ser::Error> {
		Ok(Transaction {
			kernel_offset: BlindingFactor::read(reader)?,
			owner_offset: BlindingFactor::read(reader)?,
			body: TxBody::read(reader)?,
		})
	}
}

/// Aggregate transactions into one. No transactions gives the empty
/// transaction, a single one is returned as is. Otherwise every list is
/// concatenated, matching inputs and outputs are cut through, offsets are
/// summed and the result is put back in canonical order.
pub fn aggregate(crypto: &Crypto, mut txs: Vec<Transaction>) -> Result<Transaction, Error> {
	if txs.is_empty() {
		return Ok(Transaction::empty());
	}
	if txs.len() == 1 {
		return Ok(txs.remove(0));
	}

	let mut inputs = vec![];
	let mut outputs = vec![];
	let mut kernels = vec![];
	let mut owner_sigs = vec![];
	let mut kernel_offsets = Vec::with_capacity(txs.len());
	let mut owner_offsets = Vec::with_capacity(txs.len());

	for tx in txs {
		let (i, o, k, s) = tx.body.into_parts();
		inputs.extend(i);
		outputs.extend(o);
		kernels.extend(k);
		owner_sigs.extend(s);
		kernel_offsets.push(tx.kernel_offset.clone());
		owner_offsets.push(tx.owner_offset.clone());
	}

	let removed = cut_through(&mut inputs, &mut outputs);
	if removed > 0 {
		debug!("aggregate: cut through {} input/output pairs", removed);
	}

	let kernel_offset = crypto.add_blinding_factors(&kernel_offsets, &[])?;
	let owner_offset = crypto.add_blinding_factors(&owner_offsets, &[])?;

	Ok(Transaction::new(
		kernel_offset,
		owner_offset,
		TxBody::new(inputs, outputs, kernels, owner_sigs),
	))
}
