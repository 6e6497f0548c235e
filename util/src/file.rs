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

//! File helpers.

use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Write to a temporary file alongside the target, fsync it and then rename
/// it over the target. Readers never observe a half written file.
pub fn save_via_temp_file<F, P, E>(path: P, suffix: E, mut writer: F) -> io::Result<()>
where
	F: FnMut(&mut File) -> io::Result<()>,
	P: AsRef<Path>,
	E: AsRef<std::ffi::OsStr>,
{
	let original = path.as_ref();
	let mut tmp_path = original.to_owned();
	let mut name = tmp_path
		.file_name()
		.map(|n| n.to_owned())
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
	name.push(suffix);
	tmp_path.set_file_name(name);

	{
		let mut file = File::create(&tmp_path)?;
		writer(&mut file)?;
		file.sync_all()?;
	}

	// Move the temp file into place.
	fs::rename(&tmp_path, original)?;
	Ok(())
}
