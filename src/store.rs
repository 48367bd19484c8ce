//! Storage contracts, the entity [`Store`], and built-in table backends.
//!
//! Backends implement [`TableBackend`], a deliberately small DynamoDB-shaped surface: paged
//! scans and partition queries that hand back a continuation token, point reads, and writes
//! guarded by an exists/absent [`Precondition`]. The precondition is the only concurrency
//! control in the broker; at most one create per key succeeds because the backend evaluates the
//! condition atomically with the write.
//!
//! [`Store`] layers the entity operations (admins, targets, associations) on top and always
//! follows continuation tokens until the backend reports the last page.

pub mod file;
pub mod memory;

mod admins;
mod associations;
#[cfg(feature = "aws")] pub mod dynamo;
mod targets;

#[cfg(feature = "aws")] pub use dynamo::DynamoStore;
pub use file::FileStore;
pub use memory::MemoryStore;

// crates.io
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

pub use crate::error::StoreError;

/// Boxed future returned by [`TableBackend`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Attribute map persisted per record, mirroring a DynamoDB item.
pub type Item = Map<String, Value>;

/// Storage backend contract implemented by broker table stores.
pub trait TableBackend
where
	Self: Send + Sync,
{
	/// Reads one page of `table`, starting after `start` when provided.
	///
	/// `filter` is evaluated after the page limit, so a page may be empty while still carrying a
	/// continuation token.
	fn scan<'a>(
		&'a self,
		table: Table,
		filter: Option<&'a AttributeFilter>,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page>;

	/// Reads one page of records sharing the partition key value `partition`.
	fn query<'a>(
		&'a self,
		table: Table,
		partition: &'a str,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page>;

	/// Fetches a single record, if present.
	fn get<'a>(&'a self, table: Table, key: &'a ItemKey) -> StoreFuture<'a, Option<Item>>;

	/// Writes `item` when `precondition` holds for its key.
	fn put(
		&self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> StoreFuture<'_, ConditionalOutcome>;

	/// Deletes the record at `key` when `precondition` holds.
	fn delete<'a>(
		&'a self,
		table: Table,
		key: &'a ItemKey,
		precondition: Precondition,
	) -> StoreFuture<'a, ConditionalOutcome>;
}

/// Logical tables used by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
	/// Administrators keyed by `username`.
	Admins,
	/// Admin account scopes keyed by `username` + `account_number`.
	AdminAssociations,
	/// Targets keyed by `target_id`.
	Targets,
	/// User grants keyed by `username` + `assoc_id`.
	UserAssociations,
	/// Singleton settings keyed by `item`.
	Values,
}
impl Table {
	/// Every table, in provisioning order.
	pub const ALL: [Table; 5] =
		[Table::Admins, Table::Targets, Table::UserAssociations, Table::AdminAssociations, Table::Values];

	/// Physical table name.
	pub const fn name(self) -> &'static str {
		match self {
			Table::Admins => "cooper_portal_admins",
			Table::AdminAssociations => "cooper_portal_admins_associations",
			Table::Targets => "cooper_portal_targets",
			Table::UserAssociations => "cooper_portal_user_associations",
			Table::Values => "cooper_portal_values",
		}
	}

	/// Partition (hash) key attribute.
	pub const fn partition_key(self) -> &'static str {
		match self {
			Table::Admins | Table::AdminAssociations | Table::UserAssociations => "username",
			Table::Targets => "target_id",
			Table::Values => "item",
		}
	}

	/// Sort (range) key attribute, for composite keys.
	pub const fn sort_key(self) -> Option<&'static str> {
		match self {
			Table::AdminAssociations => Some("account_number"),
			Table::UserAssociations => Some("assoc_id"),
			Table::Admins | Table::Targets | Table::Values => None,
		}
	}
}
impl Display for Table {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.name())
	}
}

/// Primary key of a record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
	/// Partition key value.
	pub partition: String,
	/// Sort key value for composite keys.
	pub sort: Option<String>,
}
impl ItemKey {
	/// Key for tables with a single partition key.
	pub fn partition(value: impl Into<String>) -> Self {
		Self { partition: value.into(), sort: None }
	}

	/// Key for tables with a composite key.
	pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
		Self { partition: partition.into(), sort: Some(sort.into()) }
	}

	/// Extracts the key of `item` according to the table's key schema.
	pub fn of(table: Table, item: &Item) -> Result<Self, StoreError> {
		let read = |attribute: &str| {
			item.get(attribute).and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
				StoreError::Serialization {
					message: format!("{table} item is missing string key attribute `{attribute}`"),
				}
			})
		};
		let partition = read(table.partition_key())?;
		let sort = table.sort_key().map(read).transpose()?;

		Ok(Self { partition, sort })
	}
}
impl Display for ItemKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.sort {
			Some(sort) => write!(f, "{}/{}", self.partition, sort),
			None => f.write_str(&self.partition),
		}
	}
}

/// Exclusive start key handed back by a truncated scan or query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageToken(pub ItemKey);

/// One page of records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
	/// Records that passed the filter.
	pub items: Vec<Item>,
	/// Continuation token; `None` on the last page.
	pub next: Option<PageToken>,
}

/// Equality filter on a string attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeFilter {
	/// Attribute name.
	pub attribute: String,
	/// Expected string value.
	pub value: String,
}
impl AttributeFilter {
	/// Matches records whose `attribute` equals `value`.
	pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
		Self { attribute: attribute.into(), value: value.into() }
	}

	/// Evaluates the filter against an item.
	pub fn matches(&self, item: &Item) -> bool {
		item.get(&self.attribute).and_then(Value::as_str) == Some(self.value.as_str())
	}
}

/// Condition evaluated atomically with a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
	/// Unconditional write.
	None,
	/// The key must not exist yet (create-if-absent).
	Absent,
	/// The key must already exist (replace- or delete-if-exists).
	Exists,
}
impl Precondition {
	/// Evaluates the condition against the current presence of the key.
	pub fn holds(self, present: bool) -> bool {
		match self {
			Precondition::None => true,
			Precondition::Absent => !present,
			Precondition::Exists => present,
		}
	}
}

/// Result of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionalOutcome {
	/// The condition held and the write was applied.
	Applied,
	/// The condition failed; nothing was written.
	ConditionFailed,
}

/// Entity repository shared by every broker component.
#[derive(Clone)]
pub struct Store {
	backend: Arc<dyn TableBackend>,
}
impl Store {
	/// Wraps a table backend.
	pub fn new(backend: Arc<dyn TableBackend>) -> Self {
		Self { backend }
	}

	/// Returns the underlying backend.
	pub fn backend(&self) -> &Arc<dyn TableBackend> {
		&self.backend
	}

	/// Scans every page of `table` and returns the fully materialized result.
	pub(crate) async fn scan_all(
		&self,
		table: Table,
		filter: Option<&AttributeFilter>,
	) -> Result<Vec<Item>, StoreError> {
		let mut items = Vec::new();
		let mut start: Option<PageToken> = None;

		loop {
			let page = self.backend.scan(table, filter, start.as_ref()).await?;

			items.extend(page.items);

			match advance(table, start.as_ref(), page.next)? {
				Some(next) => start = Some(next),
				None => return Ok(items),
			}
		}
	}

	/// Queries every page of the `partition` in `table`.
	pub(crate) async fn query_all(
		&self,
		table: Table,
		partition: &str,
	) -> Result<Vec<Item>, StoreError> {
		let mut items = Vec::new();
		let mut start: Option<PageToken> = None;

		loop {
			let page = self.backend.query(table, partition, start.as_ref()).await?;

			items.extend(page.items);

			match advance(table, start.as_ref(), page.next)? {
				Some(next) => start = Some(next),
				None => return Ok(items),
			}
		}
	}

	pub(crate) async fn get_item<T>(&self, table: Table, key: &ItemKey) -> Result<Option<T>, StoreError>
	where
		T: DeserializeOwned,
	{
		self.backend.get(table, key).await?.map(|item| decode(table, item)).transpose()
	}

	/// Writes `value` when `precondition` holds, mapping a failed condition onto the matching
	/// [`StoreError`] kind.
	pub(crate) async fn put_item<T>(
		&self,
		table: Table,
		value: &T,
		precondition: Precondition,
	) -> Result<(), StoreError>
	where
		T: Serialize,
	{
		let item = encode(table, value)?;
		let key = ItemKey::of(table, &item)?;

		match self.backend.put(table, item, precondition).await? {
			ConditionalOutcome::Applied => {
				crate::obs::log_mutation(table, "put", &key);

				Ok(())
			},
			ConditionalOutcome::ConditionFailed => Err(condition_error(table, &key, precondition)),
		}
	}

	pub(crate) async fn delete_item(&self, table: Table, key: &ItemKey) -> Result<(), StoreError> {
		match self.backend.delete(table, key, Precondition::Exists).await? {
			ConditionalOutcome::Applied => {
				crate::obs::log_mutation(table, "delete", key);

				Ok(())
			},
			ConditionalOutcome::ConditionFailed =>
				Err(condition_error(table, key, Precondition::Exists)),
		}
	}
}
impl Debug for Store {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Store(..)")
	}
}

fn advance(
	table: Table,
	current: Option<&PageToken>,
	next: Option<PageToken>,
) -> Result<Option<PageToken>, StoreError> {
	match next {
		Some(next) if Some(&next) == current => Err(StoreError::Backend {
			message: format!("{table} returned the same continuation token twice"),
		}),
		next => Ok(next),
	}
}

fn condition_error(table: Table, key: &ItemKey, precondition: Precondition) -> StoreError {
	match precondition {
		Precondition::Absent =>
			StoreError::AlreadyExists { table: table.name().into(), key: key.to_string() },
		Precondition::Exists | Precondition::None =>
			StoreError::NotFound { table: table.name().into(), key: key.to_string() },
	}
}

pub(crate) fn encode<T>(table: Table, value: &T) -> Result<Item, StoreError>
where
	T: Serialize,
{
	match serde_json::to_value(value) {
		Ok(Value::Object(map)) => Ok(map),
		Ok(other) => Err(StoreError::Serialization {
			message: format!("{table} records must serialize to objects, got {other}"),
		}),
		Err(e) => Err(StoreError::Serialization {
			message: format!("Failed to serialize {table} record: {e}"),
		}),
	}
}

pub(crate) fn decode<T>(table: Table, item: Item) -> Result<T, StoreError>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(Value::Object(item)).map_err(|e| StoreError::Serialization {
		message: format!("Failed to decode {table} record at `{}`: {}", e.path(), e.inner()),
	})
}

pub(crate) fn decode_all<T>(table: Table, items: Vec<Item>) -> Result<Vec<T>, StoreError>
where
	T: DeserializeOwned,
{
	items.into_iter().map(|item| decode(table, item)).collect()
}
