//! Simple file-backed [`TableBackend`] for lightweight deployments and local tooling.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{
		AttributeFilter, ConditionalOutcome, Item, ItemKey, Page, PageToken, Precondition,
		StoreError, StoreFuture, Table, TableBackend,
		memory::{DEFAULT_PAGE_SIZE, Tables},
	},
};

/// Persists every table to a JSON file after each applied mutation.
///
/// Mutations are staged on a copy of the tables and only become visible once the snapshot is on
/// disk, so a failed persist leaves the store unchanged.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	page_size: usize,
	inner: Arc<RwLock<Tables>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, page_size: DEFAULT_PAGE_SIZE, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Overrides how many records each scan or query page evaluates (minimum one).
	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);

		self
	}

	fn load_snapshot(path: &Path) -> Result<Tables, StoreError> {
		if !path.exists() {
			return Ok(Tables::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(Tables::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<(Table, Vec<Item>)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Tables::from_items(entries)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Tables) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(&contents.to_items()).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl TableBackend for FileStore {
	fn scan<'a>(
		&'a self,
		table: Table,
		filter: Option<&'a AttributeFilter>,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(async move { Ok(self.inner.read().scan(table, self.page_size, filter, start)) })
	}

	fn query<'a>(
		&'a self,
		table: Table,
		partition: &'a str,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		Box::pin(
			async move { Ok(self.inner.read().query(table, self.page_size, partition, start)) },
		)
	}

	fn get<'a>(&'a self, table: Table, key: &'a ItemKey) -> StoreFuture<'a, Option<Item>> {
		Box::pin(async move { Ok(self.inner.read().get(table, key)) })
	}

	fn put(
		&self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> StoreFuture<'_, ConditionalOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut staged = guard.clone();
			let outcome = staged.put(table, item, precondition)?;

			if matches!(outcome, ConditionalOutcome::Applied) {
				self.persist_locked(&staged)?;

				*guard = staged;
			}

			Ok(outcome)
		})
	}

	fn delete<'a>(
		&'a self,
		table: Table,
		key: &'a ItemKey,
		precondition: Precondition,
	) -> StoreFuture<'a, ConditionalOutcome> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut staged = guard.clone();
			let outcome = staged.delete(table, key, precondition);

			if matches!(outcome, ConditionalOutcome::Applied) {
				self.persist_locked(&staged)?;

				*guard = staged;
			}

			Ok(outcome)
		})
	}
}
