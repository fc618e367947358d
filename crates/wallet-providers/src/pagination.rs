//! History paging state and per-key request throttling.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use wallet_types::PageRequest;

/// Position in an address's history.
///
/// Offset/page providers advance by the number of items received and are
/// exhausted by a short page. Cursor providers follow the continuation token
/// and are exhausted once the upstream stops handing one out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
	pub offset: u64,
	pub limit: u64,
	pub page: u64,
	pub cursor: Option<String>,
	pub exhausted: bool,
}

impl PaginationCursor {
	pub fn new(limit: u64) -> Self {
		Self {
			offset: 0,
			limit: limit.max(1),
			page: 1,
			cursor: None,
			exhausted: false,
		}
	}

	/// The request for the next page, `None` once exhausted.
	pub fn next_request(&self) -> Option<PageRequest> {
		if self.exhausted {
			return None;
		}

		Some(PageRequest {
			offset: self.offset,
			limit: self.limit,
			page: self.page,
			cursor: self.cursor.clone(),
		})
	}

	/// Moves past a page of `received` items.
	///
	/// `next_cursor` is only consulted when `cursor_based` is set.
	pub fn advance(&mut self, received: usize, next_cursor: Option<String>, cursor_based: bool) {
		let received = received as u64;
		self.offset += received;
		self.page += 1;

		if cursor_based {
			self.exhausted = received == 0 || next_cursor.is_none();
			self.cursor = next_cursor;
		} else {
			self.exhausted = received < self.limit;
		}
	}

	pub fn is_exhausted(&self) -> bool {
		self.exhausted
	}

	pub fn reset(&mut self) {
		*self = Self::new(self.limit);
	}
}

/// Serves the last recorded value for a key while its cooldown runs.
///
/// A zero cooldown disables throttling.
#[derive(Debug)]
pub struct Throttle<V> {
	cooldown: Duration,
	entries: DashMap<String, (Instant, V)>,
}

impl<V: Clone> Throttle<V> {
	pub fn new(cooldown: Duration) -> Self {
		Self {
			cooldown,
			entries: DashMap::new(),
		}
	}

	pub fn cooldown(&self) -> Duration {
		self.cooldown
	}

	/// The recorded value, if it is younger than the cooldown.
	pub fn get(&self, key: &str) -> Option<V> {
		if self.cooldown.is_zero() {
			return None;
		}

		let entry = self.entries.get(key)?;
		let (recorded_at, value) = entry.value();
		if recorded_at.elapsed() < self.cooldown {
			Some(value.clone())
		} else {
			None
		}
	}

	pub fn record(&self, key: &str, value: V) {
		if !self.cooldown.is_zero() {
			self.entries
				.insert(key.to_string(), (Instant::now(), value));
		}
	}

	pub fn reset(&self, key: &str) {
		self.entries.remove(key);
	}

	pub fn clear(&self) {
		self.entries.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_offset_cursor_exhausts_on_short_page() {
		let mut cursor = PaginationCursor::new(10);
		let first = cursor.next_request().unwrap();
		assert_eq!((first.offset, first.page, first.limit), (0, 1, 10));

		cursor.advance(10, None, false);
		let second = cursor.next_request().unwrap();
		assert_eq!((second.offset, second.page), (10, 2));

		cursor.advance(3, None, false);
		assert!(cursor.is_exhausted());
		assert!(cursor.next_request().is_none());

		cursor.reset();
		assert_eq!(cursor.next_request().unwrap().page, 1);
	}

	#[test]
	fn test_continuation_token_cursor() {
		let mut cursor = PaginationCursor::new(2);
		cursor.advance(2, Some("abc".to_string()), true);
		assert_eq!(cursor.next_request().unwrap().cursor.as_deref(), Some("abc"));

		// A short page with a token still has more to give.
		cursor.advance(1, Some("def".to_string()), true);
		assert!(!cursor.is_exhausted());

		cursor.advance(2, None, true);
		assert!(cursor.is_exhausted());
	}

	#[test]
	fn test_throttle_serves_within_window() {
		let throttle = Throttle::new(Duration::from_secs(60));
		assert_eq!(throttle.get("addr"), None);

		throttle.record("addr", vec![1, 2, 3]);
		assert_eq!(throttle.get("addr"), Some(vec![1, 2, 3]));
		assert_eq!(throttle.get("other"), None);

		throttle.reset("addr");
		assert_eq!(throttle.get("addr"), None);
	}

	#[test]
	fn test_zero_cooldown_never_serves() {
		let throttle = Throttle::new(Duration::ZERO);
		throttle.record("addr", 1u32);
		assert_eq!(throttle.get("addr"), None);
	}

	#[test]
	fn test_expired_entries_are_not_served() {
		let throttle = Throttle::new(Duration::from_millis(1));
		throttle.record("addr", 7u32);
		std::thread::sleep(Duration::from_millis(5));
		assert_eq!(throttle.get("addr"), None);
	}
}
