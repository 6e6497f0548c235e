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

//! Common storage-related types
use crate::core::ser::{self, BinReader, BinWriter, Readable, Writeable};
use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::marker;
use std::path::{Path, PathBuf};

fn to_io_err(e: ser::Error) -> io::Error {
	io::Error::new(io::ErrorKind::Other, e)
}

/// Wrapper for a file of fixed size elements that can be read at any
/// position (random read) but for which writes are append only. Reads are
/// backed by a memory map (mmap(2)), relying on the operating system for fast
/// access and caching. The memory map is reallocated to expand it when new
/// writes are flushed.
///
/// Appends and rewinds are staged in memory until `flush`, `discard` drops
/// them. A compacted copy, without some of the elements, can be written to
/// another file.
pub struct AppendOnlyFile<T> {
	path: PathBuf,
	file: Option<File>,
	elmt_size: u16,
	mmap: Option<memmap::Mmap>,

	// Buffer of unsync'd bytes. These bytes will be appended to the file when flushed.
	buffer: Vec<u8>,
	buffer_start_pos: u64,
	// Committed size when the staged state starts with a rewind.
	buffer_start_pos_bak: Option<u64>,
	_marker: marker::PhantomData<T>,
}

impl<T> AppendOnlyFile<T>
where
	T: Debug + Readable + Writeable,
{
	/// Open a file (existing or not) as append-only, backed by a mmap.
	pub fn open<P>(path: P, elmt_size: u16) -> io::Result<AppendOnlyFile<T>>
	where
		P: AsRef<Path> + Debug,
	{
		let mut aof = AppendOnlyFile {
			file: None,
			path: path.as_ref().to_path_buf(),
			elmt_size,
			mmap: None,
			buffer: vec![],
			buffer_start_pos: 0,
			buffer_start_pos_bak: None,
			_marker: marker::PhantomData,
		};
		aof.init()?;
		Ok(aof)
	}

	/// (Re)init the underlying file and its memmap. A trailing partial
	/// element, left by an interrupted write, is cut off.
	pub fn init(&mut self) -> io::Result<()> {
		let file = OpenOptions::new()
			.read(true)
			.append(true)
			.create(true)
			.open(self.path.clone())?;

		let len = file.metadata()?.len();
		let partial = len % self.elmt_size as u64;
		if partial != 0 {
			warn!(
				"{:?}: dropping {} trailing bytes of a partial element",
				self.path, partial
			);
			file.set_len(len - partial)?;
		}

		// If we have a non-empty file then mmap it.
		self.mmap = if len - partial == 0 {
			None
		} else {
			Some(unsafe { memmap::Mmap::map(&file)? })
		};
		self.file = Some(file);
		self.buffer.clear();
		self.buffer_start_pos = self.size_in_elmts()?;
		self.buffer_start_pos_bak = None;
		Ok(())
	}

	/// Number of elements flushed to disk.
	pub fn size_in_elmts(&self) -> io::Result<u64> {
		Ok(self.size()? / self.elmt_size as u64)
	}

	/// Number of elements including the staged ones.
	pub fn size_unsync_in_elmts(&self) -> u64 {
		self.buffer_start_pos + (self.buffer.len() as u64 / self.elmt_size as u64)
	}

	/// Whether anything is staged.
	pub fn is_dirty(&self) -> bool {
		!self.buffer.is_empty() || self.buffer_start_pos_bak.is_some()
	}

	/// Append element to append-only file by serializing it to bytes and appending the bytes.
	pub fn append_elmt(&mut self, data: &T) -> io::Result<()> {
		let bytes = ser::ser_vec(data).map_err(to_io_err)?;
		if bytes.len() != self.elmt_size as usize {
			return Err(io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("element of {} bytes, expected {}", bytes.len(), self.elmt_size),
			));
		}
		self.buffer.extend_from_slice(&bytes);
		Ok(())
	}

	/// Truncate to `pos` elements. Staged elements are simply dropped, going
	/// below the flushed size truncates the file on the next flush.
	pub fn rewind(&mut self, pos: u64) {
		if pos >= self.buffer_start_pos {
			let keep = (pos - self.buffer_start_pos) as usize * self.elmt_size as usize;
			self.buffer.truncate(keep);
		} else {
			if self.buffer_start_pos_bak.is_none() {
				self.buffer_start_pos_bak = Some(self.buffer_start_pos);
			}
			self.buffer_start_pos = pos;
			self.buffer.clear();
		}
	}

	/// Syncs all writes (fsync), reallocating the memory map to make the newly
	/// written data accessible.
	pub fn flush(&mut self) -> io::Result<()> {
		if self.buffer_start_pos_bak.is_some() {
			// Flushing a rewound state, we need to truncate via set_len() before applying.
			self.mmap = None;
			self.file = None;
			let file = OpenOptions::new()
				.read(true)
				.create(true)
				.write(true)
				.open(&self.path)?;
			file.set_len(self.buffer_start_pos * self.elmt_size as u64)?;
		}

		let mut file = OpenOptions::new()
			.read(true)
			.create(true)
			.append(true)
			.open(&self.path)?;
		file.write_all(&self.buffer[..])?;
		file.sync_all()?;

		// Note: file must be non-empty to memory map it
		self.mmap = if file.metadata()?.len() == 0 {
			None
		} else {
			Some(unsafe { memmap::Mmap::map(&file)? })
		};
		self.file = Some(file);
		self.buffer.clear();
		self.buffer_start_pos_bak = None;
		self.buffer_start_pos = self.size_in_elmts()?;
		Ok(())
	}

	/// Discard the current non-flushed data.
	pub fn discard(&mut self) {
		if let Some(pos) = self.buffer_start_pos_bak.take() {
			// discarding a rewound state, restore the buffer start
			self.buffer_start_pos = pos;
		}
		self.buffer.clear();
	}

	/// Read the bytes of the element at the given position (0-indexed),
	/// empty when out of range.
	pub fn read(&self, pos: u64) -> &[u8] {
		if pos >= self.size_unsync_in_elmts() {
			return <&[u8]>::default();
		}
		let length = self.elmt_size as usize;
		if pos < self.buffer_start_pos {
			let offset = pos as usize * length;
			match &self.mmap {
				Some(mmap) if mmap.len() >= offset + length => &mmap[offset..(offset + length)],
				_ => <&[u8]>::default(),
			}
		} else {
			let offset = (pos - self.buffer_start_pos) as usize * length;
			&self.buffer[offset..(offset + length)]
		}
	}

	/// Read and deserialize the element at the given position.
	pub fn read_as_elmt(&self, pos: u64) -> io::Result<T> {
		let data = self.read(pos);
		if data.is_empty() {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				format!("no element at {} in {:?}", pos, self.path),
			));
		}
		ser::deserialize_exact(data).map_err(to_io_err)
	}

	/// Write the flushed elements, skipping those at the provided positions,
	/// to a new file at `dest`. prune_pos must be ordered.
	pub fn write_pruned_copy(&self, dest: &Path, prune_pos: &[u64]) -> io::Result<()> {
		let reader = File::open(&self.path)?;
		let mut buf_reader = BufReader::new(reader);
		let mut bin_reader = BinReader::new(&mut buf_reader);

		let mut buf_writer = BufWriter::new(File::create(dest)?);
		{
			let mut bin_writer = BinWriter::new(&mut buf_writer);
			let size = self.size_in_elmts()?;
			let mut prune_pos = prune_pos;
			for current_pos in 0..size {
				let elmt = T::read(&mut bin_reader).map_err(to_io_err)?;
				if prune_pos.first() == Some(&current_pos) {
					// Pruned pos, moving on.
					prune_pos = &prune_pos[1..];
				} else {
					elmt.write(&mut bin_writer).map_err(to_io_err)?;
				}
			}
		}
		buf_writer.flush()?;
		buf_writer.get_ref().sync_all()?;
		Ok(())
	}

	/// Current size of the file in bytes.
	pub fn size(&self) -> io::Result<u64> {
		fs::metadata(&self.path).map(|md| md.len())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::core::core::hash::{hash_bytes, Hash};

	fn hashes(n: u8) -> Vec<Hash> {
		(0..n).map(|i| hash_bytes(&[i])).collect()
	}

	fn open(path: &Path) -> AppendOnlyFile<Hash> {
		AppendOnlyFile::open(path.to_path_buf(), Hash::LEN as u16).unwrap()
	}

	fn clean_output_dir(test_dir: &str) -> PathBuf {
		let _ = fs::remove_dir_all(test_dir);
		fs::create_dir_all(test_dir).unwrap();
		PathBuf::from(test_dir)
	}

	#[test]
	fn append_flush_discard() {
		let test_dir = "target/tmp/aof_append_flush_discard";
		let path = clean_output_dir(test_dir).join("hashes.bin");
		let hs = hashes(5);

		let mut aof = open(&path);
		for h in &hs[..3] {
			aof.append_elmt(h).unwrap();
		}
		assert_eq!(aof.size_unsync_in_elmts(), 3);
		assert_eq!(aof.read_as_elmt(2).unwrap(), hs[2]);
		aof.flush().unwrap();
		assert_eq!(aof.size_in_elmts().unwrap(), 3);

		aof.append_elmt(&hs[3]).unwrap();
		aof.discard();
		assert_eq!(aof.size_unsync_in_elmts(), 3);
		assert!(aof.read(3).is_empty());

		let aof = open(&path);
		assert_eq!(aof.read_as_elmt(0).unwrap(), hs[0]);
		assert_eq!(aof.size_unsync_in_elmts(), 3);
		let _ = fs::remove_dir_all(test_dir);
	}

	#[test]
	fn rewind_staged_and_flushed() {
		let test_dir = "target/tmp/aof_rewind_staged_and_flushed";
		let path = clean_output_dir(test_dir).join("hashes.bin");
		let hs = hashes(5);

		let mut aof = open(&path);
		for h in &hs[..4] {
			aof.append_elmt(h).unwrap();
		}
		aof.flush().unwrap();

		// below the flushed size, then re-append
		aof.rewind(2);
		aof.append_elmt(&hs[4]).unwrap();
		assert_eq!(aof.read_as_elmt(2).unwrap(), hs[4]);
		assert_eq!(aof.size_unsync_in_elmts(), 3);

		// discard restores the flushed file
		aof.discard();
		assert_eq!(aof.size_unsync_in_elmts(), 4);
		assert_eq!(aof.read_as_elmt(2).unwrap(), hs[2]);

		aof.rewind(1);
		aof.flush().unwrap();
		assert_eq!(aof.size_in_elmts().unwrap(), 1);

		// within the staged buffer
		aof.append_elmt(&hs[1]).unwrap();
		aof.append_elmt(&hs[2]).unwrap();
		aof.rewind(2);
		assert_eq!(aof.size_unsync_in_elmts(), 2);
		aof.flush().unwrap();
		assert_eq!(open(&path).size_in_elmts().unwrap(), 2);
		let _ = fs::remove_dir_all(test_dir);
	}

	#[test]
	fn prune_rewrite() {
		let test_dir = "target/tmp/aof_prune_rewrite";
		let path = clean_output_dir(test_dir).join("hashes.bin");
		let hs = hashes(5);

		let mut aof = open(&path);
		for h in &hs {
			aof.append_elmt(h).unwrap();
		}
		aof.flush().unwrap();
		let copy_path = path.with_file_name("hashes_1.bin");
		aof.write_pruned_copy(&copy_path, &[1, 3]).unwrap();

		// the source is untouched
		assert_eq!(aof.size_in_elmts().unwrap(), 5);
		let copy = open(&copy_path);
		assert_eq!(copy.size_in_elmts().unwrap(), 3);
		assert_eq!(copy.read_as_elmt(0).unwrap(), hs[0]);
		assert_eq!(copy.read_as_elmt(1).unwrap(), hs[2]);
		assert_eq!(copy.read_as_elmt(2).unwrap(), hs[4]);
		let _ = fs::remove_dir_all(test_dir);
	}
}
