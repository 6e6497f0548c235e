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

//! Shared, internally locked secp256k1 context. Constructed once by the
//! owner of the engine and handed to whatever needs the curve, there is no
//! process wide instance.

use crate::secp::{ContextFlag, Secp256k1};
use crate::Mutex;
use rand::thread_rng;
use std::sync::Arc;

/// Cloneable handle to a single secp256k1 context.
#[derive(Clone)]
pub struct SecpContext {
	inner: Arc<Mutex<Secp256k1>>,
}

impl SecpContext {
	/// New context with commitment capabilities, randomized against side
	/// channel attacks.
	pub fn new() -> SecpContext {
		let mut secp = Secp256k1::with_caps(ContextFlag::Commit);
		secp.randomize(&mut thread_rng());
		SecpContext {
			inner: Arc::new(Mutex::new(secp)),
		}
	}

	/// Run the provided closure with exclusive access to the context.
	pub fn with<F, T>(&self, f: F) -> T
	where
		F: FnOnce(&Secp256k1) -> T,
	{
		let secp = self.inner.lock();
		f(&secp)
	}
}

impl Default for SecpContext {
	fn default() -> SecpContext {
		SecpContext::new()
	}
}
