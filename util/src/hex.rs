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

/// Implements hex-encoding from bytes to string and decoding of strings
/// to bytes. It's simple enough that we can just have our own.
use std::fmt::Write;

/// Encode the provided bytes into a hex string
pub fn to_hex(bytes: &[u8]) -> String {
	let mut s = String::with_capacity(bytes.len() * 2);
	for byte in bytes {
		// writing into a String cannot fail
		let _ = write!(&mut s, "{:02x}", byte);
	}
	s
}

/// Decode a hex string into bytes.
pub fn from_hex(hex_str: &str) -> Result<Vec<u8>, String> {
	let hex_trim = hex_str.trim().trim_start_matches("0x");
	if !hex_trim.is_ascii() || hex_trim.len() % 2 == 1 {
		return Err(format!("invalid hex string: {}", hex_trim));
	}
	(0..hex_trim.len())
		.step_by(2)
		.map(|i| u8::from_str_radix(&hex_trim[i..i + 2], 16).map_err(|e| e.to_string()))
		.collect()
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_to_hex() {
		assert_eq!(to_hex(&[0, 0, 0, 0]), "00000000");
		assert_eq!(to_hex(&[10, 11, 12, 13]), "0a0b0c0d");
		assert_eq!(to_hex(&[0, 0, 0, 255]), "000000ff");
	}

	#[test]
	fn test_from_hex() {
		assert_eq!(from_hex("00000000").unwrap(), vec![0, 0, 0, 0]);
		assert_eq!(from_hex("0a0b0c0d").unwrap(), vec![10, 11, 12, 13]);
		assert_eq!(from_hex("0x000000ff").unwrap(), vec![0, 0, 0, 255]);
		assert!(from_hex("abc").is_err());
	}
}
