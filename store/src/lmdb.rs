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

//! Key/value store on LMDB. Records are read from committed state, written
//! through a `Batch` that commits atomically or not at all.

use std::fs;
use std::sync::Arc;

use lmdb_zero as lmdb;
use lmdb_zero::traits::CreateCursor;
use lmdb_zero::LmdbResultExt;

use crate::core::ser;
use crate::util::RwLock;

/// Map size granularity, 128 MB.
pub const ALLOC_CHUNK_SIZE: usize = 134_217_728;
// grow once the map is this full
const RESIZE_PERCENT: f32 = 0.9;
// and grow until it is at most this full
const RESIZE_MIN_TARGET_PERCENT: f32 = 0.65;

/// Store errors
#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum Error {
	/// Couldn't find what we were looking for
	#[error("DB Not Found Error: {0}")]
	NotFoundErr(String),
	/// Wraps an error originating from LMDB
	#[error("LMDB error: {0}")]
	LmdbErr(lmdb::error::Error),
	/// Wraps a serialization error for Writeable or Readable
	#[error("Serialization Error: {0}")]
	SerErr(ser::Error),
	/// File handling error
	#[error("File handling Error: {0}")]
	FileErr(String),
	/// Other error
	#[error("Other Error: {0}")]
	OtherErr(String),
}

impl From<lmdb::error::Error> for Error {
	fn from(e: lmdb::error::Error) -> Error {
		Error::LmdbErr(e)
	}
}

impl From<ser::Error> for Error {
	fn from(e: ser::Error) -> Error {
		Error::SerErr(e)
	}
}

/// Turn a missing value into `NotFoundErr`.
pub fn option_to_not_found<T, F>(res: Result<Option<T>, Error>, field_name: F) -> Result<T, Error>
where
	F: Fn() -> String,
{
	res?.ok_or_else(|| Error::NotFoundErr(field_name()))
}

fn open_db(env: &Arc<lmdb::Environment>, name: &str) -> Result<Arc<lmdb::Database<'static>>, Error> {
	let db = lmdb::Database::open(
		env.clone(),
		Some(name),
		&lmdb::DatabaseOptions::new(lmdb::db::CREATE),
	)?;
	Ok(Arc::new(db))
}

/// A single named database in an LMDB environment.
pub struct Store {
	env: Arc<lmdb::Environment>,
	// None only while the map is being resized
	db: RwLock<Option<Arc<lmdb::Database<'static>>>>,
	name: String,
}

impl Store {
	/// Open (or create) database `db_name` in environment `env_name`
	/// under `root_path`, both defaulting to "lmdb".
	pub fn new(
		root_path: &str,
		env_name: Option<&str>,
		db_name: Option<&str>,
		max_readers: Option<u32>,
	) -> Result<Store, Error> {
		let full_path = format!("{}/{}", root_path, env_name.unwrap_or("lmdb"));
		fs::create_dir_all(&full_path)
			.map_err(|e| Error::FileErr(format!("{}: {}", full_path, e)))?;

		let mut env_builder = lmdb::EnvBuilder::new()?;
		env_builder.set_maxdbs(8)?;
		if let Some(max_readers) = max_readers {
			env_builder.set_maxreaders(max_readers)?;
		}
		let env = Arc::new(unsafe { env_builder.open(&full_path, lmdb::open::NOTLS, 0o600)? });
		debug!("lmdb: {} map size {}", full_path, env.info()?.mapsize);

		let name = db_name.unwrap_or("lmdb").to_owned();
		let db = open_db(&env, &name)?;
		Ok(Store {
			env,
			db: RwLock::new(Some(db)),
			name,
		})
	}

	fn with_db<F, T>(&self, f: F) -> Result<T, Error>
	where
		F: FnOnce(&Arc<lmdb::Database<'static>>) -> Result<T, Error>,
	{
		let lock = self.db.read();
		let db = lock
			.as_ref()
			.ok_or_else(|| Error::NotFoundErr(format!("db {} is closed", self.name)))?;
		f(db)
	}

	/// Grow the map when it is close to full. Must not run with a
	/// transaction open, `batch` calls it before starting one.
	fn resize_if_needed(&self) -> Result<(), Error> {
		let info = self.env.info()?;
		let used = self.env.stat()?.psize as usize * info.last_pgno;
		let full = used as f32 / info.mapsize as f32 > RESIZE_PERCENT;
		if !full && info.mapsize >= ALLOC_CHUNK_SIZE {
			return Ok(());
		}

		let mut mapsize = info.mapsize.max(ALLOC_CHUNK_SIZE);
		while used as f32 / mapsize as f32 > RESIZE_MIN_TARGET_PERCENT {
			mapsize += ALLOC_CHUNK_SIZE;
		}

		let mut w = self.db.write();
		*w = None;
		unsafe {
			self.env.set_mapsize(mapsize)?;
		}
		*w = Some(open_db(&self.env, &self.name)?);
		info!("lmdb: {} resized from {} to {}", self.name, info.mapsize, mapsize);
		Ok(())
	}

	fn read<F, T>(&self, key: &[u8], f: F) -> Result<Option<T>, Error>
	where
		F: FnOnce(&[u8]) -> Result<T, Error>,
	{
		self.with_db(|db| {
			let txn = lmdb::ReadTransaction::new(self.env.clone())?;
			let access = txn.access();
			let res: Option<&[u8]> = access.get(db, key).to_opt()?;
			res.map(f).transpose()
		})
	}

	/// Deserialized value under `key`, committed state only.
	pub fn get_ser<T: ser::Readable>(&self, key: &[u8]) -> Result<Option<T>, Error> {
		self.read(key, |data| ser::deserialize_exact(data).map_err(From::from))
	}

	/// Raw bytes under `key`, committed state only.
	pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
		self.read(key, |data| Ok(data.to_vec()))
	}

	/// Iterate over the committed records whose key starts with `prefix`,
	/// in key order. Records `deserialize` rejects are skipped.
	pub fn iter<F, T>(&self, prefix: &[u8], deserialize: F) -> Result<PrefixIterator<F, T>, Error>
	where
		F: Fn(&[u8], &[u8]) -> Result<T, Error>,
	{
		self.with_db(|db| {
			let tx = Arc::new(lmdb::ReadTransaction::new(self.env.clone())?);
			let cursor = Arc::new(tx.cursor(db.clone())?);
			Ok(PrefixIterator {
				tx,
				cursor,
				seek: false,
				prefix: prefix.to_vec(),
				deserialize,
			})
		})
	}

	/// Start a write transaction.
	pub fn batch(&self) -> Result<Batch<'_>, Error> {
		self.resize_if_needed()?;
		let tx = lmdb::WriteTransaction::new(self.env.clone())?;
		Ok(Batch { store: self, tx })
	}
}

/// Writes applied together on `commit`, visible to the batch's own reads
/// right away. Dropping the batch aborts it.
pub struct Batch<'a> {
	store: &'a Store,
	tx: lmdb::WriteTransaction<'a>,
}

impl<'a> Batch<'a> {
	/// Put raw bytes under `key`.
	pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
		self.store.with_db(|db| {
			self.tx
				.access()
				.put(db, key, value, lmdb::put::Flags::empty())?;
			Ok(())
		})
	}

	/// Put the serialization of `value` under `key`.
	pub fn put_ser<W: ser::Writeable>(&self, key: &[u8], value: &W) -> Result<(), Error> {
		self.put(key, &ser::ser_vec(value)?)
	}

	/// Deserialized value under `key`, including this batch's writes.
	pub fn get_ser<T: ser::Readable>(&self, key: &[u8]) -> Result<Option<T>, Error> {
		self.store.with_db(|db| {
			let access = self.tx.access();
			let res: Option<&[u8]> = access.get(db, key).to_opt()?;
			res.map(|data| ser::deserialize_exact(data).map_err(From::from))
				.transpose()
		})
	}

	/// Delete `key`, a missing key is not an error.
	pub fn delete(&self, key: &[u8]) -> Result<(), Error> {
		self.store.with_db(|db| {
			self.tx.access().del_key(db, key).to_opt()?;
			Ok(())
		})
	}

	/// Commit all writes.
	pub fn commit(self) -> Result<(), Error> {
		self.tx.commit()?;
		Ok(())
	}
}

/// Iterator over the records under a key prefix, holding its own read
/// transaction.
pub struct PrefixIterator<F, T>
where
	F: Fn(&[u8], &[u8]) -> Result<T, Error>,
{
	tx: Arc<lmdb::ReadTransaction<'static>>,
	cursor: Arc<lmdb::Cursor<'static, 'static>>,
	seek: bool,
	prefix: Vec<u8>,
	deserialize: F,
}

impl<F, T> Iterator for PrefixIterator<F, T>
where
	F: Fn(&[u8], &[u8]) -> Result<T, Error>,
{
	type Item = T;

	fn next(&mut self) -> Option<Self::Item> {
		let access = self.tx.access();
		let cursor = Arc::get_mut(&mut self.cursor)?;
		let kv: Result<(&[u8], &[u8]), _> = if self.seek {
			cursor.next(&access)
		} else {
			self.seek = true;
			cursor.seek_range_k(&access, &self.prefix[..])
		};
		kv.ok()
			.filter(|(k, _)| k.starts_with(self.prefix.as_slice()))
			.and_then(|(k, v)| (self.deserialize)(k, v).ok())
	}
}
