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

//! Comments written ahead of sections and keys of the generated .toml

/// Section headers and keys, each with the comment lines written before it.
const COMMENTS: &[(&str, &[&str])] = &[
	(
		"[chain]",
		&[
			"# Generated configuration file for the MWEB state engine",
			"#",
			"# Without a configuration file argument the engine looks for this",
			"# file in [user home]/.mweb",
			"",
			"#########################################",
			"### CHAIN CONFIGURATION               ###",
			"#########################################",
		],
	),
	(
		"db_root",
		&["#directory, relative to the current one, holding the chain state"],
	),
	(
		"compaction_interval",
		&[
			"#compact the output and range proof MMRs every this many blocks",
			"#blocks below the last compaction can no longer be undone, 0 disables it",
		],
	),
	(
		"[logging]",
		&[
			"#########################################",
			"### LOGGING CONFIGURATION             ###",
			"#########################################",
		],
	),
	("log_to_stdout", &["#whether to log to stdout"]),
	(
		"stdout_log_level",
		&["#stdout threshold: Error, Warn, Info, Debug, Trace"],
	),
	("log_to_file", &["#whether to log to a file"]),
	(
		"file_log_level",
		&["#file threshold: Error, Warn, Info, Debug, Trace"],
	),
	("log_file_path", &["#path of the log file"]),
	(
		"log_file_append",
		&["#append to the log file (true) or truncate it on every start (false)"],
	),
	(
		"log_max_size",
		&[
			"#roll the log file over once it reaches this many bytes",
			"#remove the line to never roll over",
		],
	),
	("log_max_files", &["#number of rolled log files kept"]),
];

/// Section header or key name of a toml line, if it has one.
fn key_of(line: &str) -> Option<&str> {
	let line = line.trim();
	if line.starts_with('[') && line.ends_with(']') {
		Some(line)
	} else {
		line.split('=').next().filter(|_| line.contains('=')).map(str::trim)
	}
}

/// Write the comment of every known section and key ahead of its line.
pub fn insert_comments(orig: String) -> String {
	let mut out = String::with_capacity(orig.len() * 2);
	for line in orig.lines() {
		let comment = key_of(line)
			.and_then(|key| COMMENTS.iter().find(|(k, _)| *k == key))
			.map(|(_, lines)| *lines);
		if let Some(lines) = comment {
			out.push('\n');
			for l in lines {
				out.push_str(l);
				out.push('\n');
			}
		}
		out.push_str(line);
		out.push('\n');
	}
	out
}
