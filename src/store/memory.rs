//! Thread-safe in-memory [`TableBackend`] implementation for local development and tests.

// std
use std::{
	ops::Bound,
	sync::atomic::{AtomicUsize, Ordering},
};
// self
use crate::{
	_prelude::*,
	store::{
		AttributeFilter, ConditionalOutcome, Item, ItemKey, Page, PageToken, Precondition,
		StoreError, StoreFuture, Table, TableBackend,
	},
};

/// Default number of records evaluated per scan or query page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Records of every table, ordered by key so continuation tokens stay stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Tables(HashMap<Table, BTreeMap<ItemKey, Item>>);
impl Tables {
	pub(crate) fn from_items<I>(entries: I) -> Result<Self, StoreError>
	where
		I: IntoIterator<Item = (Table, Vec<Item>)>,
	{
		let mut tables = Self::default();

		for (table, items) in entries {
			for item in items {
				let key = ItemKey::of(table, &item)?;

				tables.0.entry(table).or_default().insert(key, item);
			}
		}

		Ok(tables)
	}

	pub(crate) fn to_items(&self) -> Vec<(Table, Vec<Item>)> {
		let mut snapshot = self
			.0
			.iter()
			.map(|(table, rows)| (*table, rows.values().cloned().collect::<Vec<_>>()))
			.collect::<Vec<_>>();

		snapshot.sort_by_key(|(table, _)| *table);

		snapshot
	}

	pub(crate) fn scan(
		&self,
		table: Table,
		page_size: usize,
		filter: Option<&AttributeFilter>,
		start: Option<&PageToken>,
	) -> Page {
		let Some(rows) = self.0.get(&table) else {
			return Page::default();
		};
		let lower = match start {
			Some(PageToken(key)) => Bound::Excluded(key.clone()),
			None => Bound::Unbounded,
		};

		collect_page(rows.range((lower, Bound::Unbounded)), page_size, |item| {
			filter.is_none_or(|f| f.matches(item))
		})
	}

	pub(crate) fn query(
		&self,
		table: Table,
		page_size: usize,
		partition: &str,
		start: Option<&PageToken>,
	) -> Page {
		let Some(rows) = self.0.get(&table) else {
			return Page::default();
		};
		// Keys order by partition first, so a partition is one contiguous range.
		let lower = match start {
			Some(PageToken(key)) => Bound::Excluded(key.clone()),
			None => Bound::Included(ItemKey::partition(partition)),
		};
		let rows = rows
			.range((lower, Bound::Unbounded))
			.take_while(|(key, _)| key.partition == partition);

		collect_page(rows, page_size, |_| true)
	}

	pub(crate) fn get(&self, table: Table, key: &ItemKey) -> Option<Item> {
		self.0.get(&table).and_then(|rows| rows.get(key)).cloned()
	}

	pub(crate) fn put(
		&mut self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> Result<ConditionalOutcome, StoreError> {
		let key = ItemKey::of(table, &item)?;
		let rows = self.0.entry(table).or_default();

		if !precondition.holds(rows.contains_key(&key)) {
			return Ok(ConditionalOutcome::ConditionFailed);
		}

		rows.insert(key, item);

		Ok(ConditionalOutcome::Applied)
	}

	pub(crate) fn delete(
		&mut self,
		table: Table,
		key: &ItemKey,
		precondition: Precondition,
	) -> ConditionalOutcome {
		let present = self.0.get(&table).is_some_and(|rows| rows.contains_key(key));

		if !precondition.holds(present) {
			return ConditionalOutcome::ConditionFailed;
		}
		if let Some(rows) = self.0.get_mut(&table) {
			rows.remove(key);
		}

		ConditionalOutcome::Applied
	}

	pub(crate) fn len(&self, table: Table) -> usize {
		self.0.get(&table).map_or(0, BTreeMap::len)
	}
}

/// Evaluates up to `page_size` rows, then applies `keep`.
fn collect_page<'a, I, F>(rows: I, page_size: usize, keep: F) -> Page
where
	I: Iterator<Item = (&'a ItemKey, &'a Item)>,
	F: Fn(&Item) -> bool,
{
	let mut rows = rows.peekable();
	let mut items = Vec::new();
	let mut last = None;

	for (key, item) in rows.by_ref().take(page_size.max(1)) {
		if keep(item) {
			items.push(item.clone());
		}

		last = Some(key);
	}

	let next = match (last, rows.peek()) {
		(Some(last), Some(_)) => Some(PageToken(last.clone())),
		_ => None,
	};

	Page { items, next }
}

/// Thread-safe storage backend that keeps records in-process for tests and demos.
///
/// Scans and queries are paged like DynamoDB: each page evaluates at most `page_size` records
/// and filters are applied afterwards.
#[derive(Clone, Debug)]
pub struct MemoryStore {
	tables: Arc<RwLock<Tables>>,
	page_size: usize,
	page_reads: Arc<AtomicUsize>,
}
impl MemoryStore {
	/// Creates an empty store that evaluates `page_size` records per page (minimum one).
	pub fn with_page_size(page_size: usize) -> Self {
		Self {
			tables: Default::default(),
			page_size: page_size.max(1),
			page_reads: Default::default(),
		}
	}

	/// Number of scan/query pages served so far.
	pub fn page_reads(&self) -> usize {
		self.page_reads.load(Ordering::Relaxed)
	}

	/// Number of records currently held in `table`.
	pub fn len(&self, table: Table) -> usize {
		self.tables.read().len(table)
	}

	/// Returns `true` when `table` holds no records.
	pub fn is_empty(&self, table: Table) -> bool {
		self.len(table) == 0
	}

	fn count_page(&self) {
		self.page_reads.fetch_add(1, Ordering::Relaxed);
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self::with_page_size(DEFAULT_PAGE_SIZE)
	}
}
impl TableBackend for MemoryStore {
	fn scan<'a>(
		&'a self,
		table: Table,
		filter: Option<&'a AttributeFilter>,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(async move {
			self.count_page();

			Ok(self.tables.read().scan(table, self.page_size, filter, start))
		})
	}

	fn query<'a>(
		&'a self,
		table: Table,
		partition: &'a str,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(async move {
			self.count_page();

			Ok(self.tables.read().query(table, self.page_size, partition, start))
		})
	}

	fn get<'a>(&'a self, table: Table, key: &'a ItemKey) -> StoreFuture<'a, Option<Item>> {
		Box::pin(async move { Ok(self.tables.read().get(table, key)) })
	}

	fn put(
		&self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> StoreFuture<'_, ConditionalOutcome> {
		Box::pin(async move { self.tables.write().put(table, item, precondition) })
	}

	fn delete<'a>(
		&'a self,
		table: Table,
		key: &'a ItemKey,
		precondition: Precondition,
	) -> StoreFuture<'a, ConditionalOutcome> {
		Box::pin(async move { Ok(self.tables.write().delete(table, key, precondition)) })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn target(id: &str, group: &str) -> Item {
		match json!({ "target_id": id, "target_group_mapping": group }) {
			serde_json::Value::Object(map) => map,
			_ => unreachable!(),
		}
	}

	#[test]
	fn pages_evaluate_before_filtering() {
		let mut tables = Tables::default();

		for (id, group) in [("t1", "g1"), ("t2", "g2"), ("t3", "g1")] {
			tables
				.put(Table::Targets, target(id, group), Precondition::None)
				.expect("Fixture targets should be writable.");
		}

		let filter = AttributeFilter::equals("target_group_mapping", "g2");
		let first = tables.scan(Table::Targets, 1, Some(&filter), None);

		assert!(first.items.is_empty());
		assert_eq!(first.next, Some(PageToken(ItemKey::partition("t1"))));

		let second = tables.scan(Table::Targets, 1, Some(&filter), first.next.as_ref());

		assert_eq!(second.items.len(), 1);
		assert!(second.next.is_some());

		let last = tables.scan(Table::Targets, 1, Some(&filter), second.next.as_ref());

		assert!(last.items.is_empty());
		assert_eq!(last.next, None);
	}

	#[test]
	fn conditional_writes_respect_presence() {
		let mut tables = Tables::default();

		assert_eq!(
			tables
				.put(Table::Targets, target("t1", "g1"), Precondition::Absent)
				.expect("First create should not error."),
			ConditionalOutcome::Applied
		);
		assert_eq!(
			tables
				.put(Table::Targets, target("t1", "g2"), Precondition::Absent)
				.expect("Second create should not error."),
			ConditionalOutcome::ConditionFailed
		);
		assert_eq!(
			tables
				.get(Table::Targets, &ItemKey::partition("t1"))
				.expect("Original record should remain.")["target_group_mapping"],
			"g1"
		);
		assert_eq!(
			tables.delete(Table::Targets, &ItemKey::partition("t9"), Precondition::Exists),
			ConditionalOutcome::ConditionFailed
		);
	}
}
