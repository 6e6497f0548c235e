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

use mweb_core::ser::{self, Readable, Reader, Writeable, Writer};
use mweb_store as store;
use mweb_util as util;

use std::fs;

#[derive(Clone, Debug, PartialEq)]
struct Record {
	height: u64,
	tag: Vec<u8>,
}

impl Readable for Record {
	fn read<R: Reader>(reader: &mut R) -> Result<Record, ser::Error> {
		Ok(Record {
			height: reader.read_u64()?,
			tag: reader.read_bytes_len_prefix()?,
		})
	}
}

impl Writeable for Record {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), ser::Error> {
		writer.write_u64(self.height)?;
		writer.write_bytes(&self.tag)
	}
}

fn clean_output_dir(test_dir: &str) {
	let _ = fs::remove_dir_all(test_dir);
}

fn setup(test_dir: &str) {
	util::init_test_logger();
	clean_output_dir(test_dir);
}

fn record(height: u64) -> Record {
	Record {
		height,
		tag: format!("record {}", height).into_bytes(),
	}
}

#[test]
fn batch_writes_invisible_until_commit() -> Result<(), store::Error> {
	let test_dir = "target/tmp/lmdb_batch_isolation";
	setup(test_dir);
	{
		let store = store::Store::new(test_dir, None, None, None)?;
		let key = store::u64_to_key(b'R', 1);

		let batch = store.batch()?;
		batch.put_ser(&key, &record(1))?;
		assert_eq!(batch.get_ser::<Record>(&key)?, Some(record(1)));
		assert_eq!(store.get_ser::<Record>(&key)?, None);
		batch.commit()?;

		assert_eq!(store.get_ser::<Record>(&key)?, Some(record(1)));

		// dropped without commit
		{
			let batch = store.batch()?;
			batch.delete(&key)?;
			assert_eq!(batch.get_ser::<Record>(&key)?, None);
		}
		assert_eq!(store.get_ser::<Record>(&key)?, Some(record(1)));
	}
	// reopened
	{
		let store = store::Store::new(test_dir, None, None, None)?;
		let key = store::u64_to_key(b'R', 1);
		assert_eq!(
			store::option_to_not_found(store.get_ser::<Record>(&key), || "r1".to_string())?,
			record(1)
		);
		assert_eq!(
			store::option_to_not_found(
				store.get_ser::<Record>(&store::u64_to_key(b'R', 2)),
				|| "r2".to_string()
			),
			Err(store::Error::NotFoundErr("r2".to_string()))
		);
	}
	clean_output_dir(test_dir);
	Ok(())
}

#[test]
fn prefix_iteration_in_key_order() -> Result<(), store::Error> {
	let test_dir = "target/tmp/lmdb_prefix_iter";
	setup(test_dir);
	let store = store::Store::new(test_dir, None, None, None)?;
	{
		let batch = store.batch()?;
		for h in &[5u64, 1, 3, 300] {
			batch.put_ser(&store::u64_to_key(b'R', *h), &record(*h))?;
		}
		batch.put_ser(&store::u64_to_key(b'S', 2), &record(2))?;
		batch.put(&store::to_key(b'Q', b"raw"), b"bytes")?;
		batch.commit()?;
	}

	let heights: Vec<u64> = store
		.iter(&[b'R', b':'], |_, mut v| {
			ser::deserialize::<Record, _>(&mut v).map_err(From::from)
		})?
		.map(|r| r.height)
		.collect();
	assert_eq!(heights, vec![1, 3, 5, 300]);

	assert_eq!(
		store.get(&store::to_key(b'Q', b"raw"))?,
		Some(b"bytes".to_vec())
	);
	clean_output_dir(test_dir);
	Ok(())
}

#[test]
fn delete_missing_key() -> Result<(), store::Error> {
	let test_dir = "target/tmp/lmdb_delete_missing";
	setup(test_dir);
	let store = store::Store::new(test_dir, None, None, None)?;
	let batch = store.batch()?;
	batch.delete(&store::to_key(b'X', b"nothing"))?;
	batch.commit()?;
	clean_output_dir(test_dir);
	Ok(())
}
