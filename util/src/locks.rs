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

//! Acquire several locks as a single operation.
//!
//! Taking two locks one at a time in different orders on different call
//! sites deadlocks. `lock_both` never blocks while holding a lock it has
//! not yet paired: it blocks on one, try-locks the other and backs off
//! (releasing everything) when the second is busy, alternating which lock
//! it blocks on.

use crate::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

/// Something that can be locked, blocking or not.
pub trait Lockable {
	/// RAII guard released on drop.
	type Guard;
	/// Block until the lock is held.
	fn acquire(&self) -> Self::Guard;
	/// Take the lock only if it is free right now.
	fn try_acquire(&self) -> Option<Self::Guard>;
}

/// Shared (read) access to a `RwLock`.
pub struct Read<'a, T>(pub &'a RwLock<T>);

/// Exclusive (write) access to a `RwLock`.
pub struct Write<'a, T>(pub &'a RwLock<T>);

impl<'a, T> Lockable for Read<'a, T> {
	type Guard = RwLockReadGuard<'a, T>;

	fn acquire(&self) -> Self::Guard {
		self.0.read()
	}

	fn try_acquire(&self) -> Option<Self::Guard> {
		self.0.try_read()
	}
}

impl<'a, T> Lockable for Write<'a, T> {
	type Guard = RwLockWriteGuard<'a, T>;

	fn acquire(&self) -> Self::Guard {
		self.0.write()
	}

	fn try_acquire(&self) -> Option<Self::Guard> {
		self.0.try_write()
	}
}

/// Guards over two resources, released together when dropped.
pub struct MultiGuard<A, B> {
	/// Guard on the first resource.
	pub first: A,
	/// Guard on the second resource.
	pub second: B,
}

impl<A, B> MultiGuard<A, B> {
	/// Take ownership of guards that were acquired elsewhere, without
	/// locking anything again.
	pub fn adopt(first: A, second: B) -> MultiGuard<A, B> {
		MultiGuard { first, second }
	}
}

/// Lock both resources without risking a lock order deadlock against any
/// other caller of `lock_both`, whatever order they pass the locks in.
pub fn lock_both<L1, L2>(first: L1, second: L2) -> MultiGuard<L1::Guard, L2::Guard>
where
	L1: Lockable,
	L2: Lockable,
{
	loop {
		{
			let g1 = first.acquire();
			if let Some(g2) = second.try_acquire() {
				return MultiGuard::adopt(g1, g2);
			}
		}
		thread::yield_now();
		{
			let g2 = second.acquire();
			if let Some(g1) = first.try_acquire() {
				return MultiGuard::adopt(g1, g2);
			}
		}
		thread::yield_now();
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::sync::Arc;

	#[test]
	fn lock_both_opposite_orders() {
		let a = Arc::new(RwLock::new(0u64));
		let b = Arc::new(RwLock::new(0u64));

		let mut handles = vec![];
		for i in 0..4 {
			let a = a.clone();
			let b = b.clone();
			handles.push(thread::spawn(move || {
				for _ in 0..1000 {
					let mut guards = if i % 2 == 0 {
						lock_both(Write(&*a), Write(&*b))
					} else {
						let g = lock_both(Write(&*b), Write(&*a));
						MultiGuard::adopt(g.second, g.first)
					};
					*guards.first += 1;
					*guards.second += 1;
				}
			}));
		}
		for h in handles {
			h.join().unwrap();
		}
		assert_eq!(*a.read(), 4000);
		assert_eq!(*b.read(), 4000);
	}

	#[test]
	fn readers_share() {
		let a = RwLock::new(1u8);
		let b = RwLock::new(2u8);
		let r = a.read();
		let guards = lock_both(Read(&a), Write(&b));
		assert_eq!(*r, *guards.first);
		assert_eq!(*guards.second, 2);
	}
}
