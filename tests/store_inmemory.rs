// std
use std::collections::BTreeSet;
// self
use aws_access_broker::{
	_preludet::*,
	error::{ErrorKind, StoreError},
	model::{Admin, Association, Target, TargetId, Username},
	store::{
		AttributeFilter, ConditionalOutcome, Item, ItemKey, MemoryStore, Page, PageToken,
		Precondition, Store, StoreFuture, Table, TableBackend,
	},
};

const ARN: &str = "arn:aws:iam::123456789012:role/S3Access";

fn username(value: &str) -> Username {
	Username::new(value).expect("Username fixture should be valid.")
}

fn target_id(value: &str) -> TargetId {
	TargetId::new(value).expect("Target id fixture should be valid.")
}

fn role(id: &str, group: &str) -> Target {
	Target::role(format!("role-{id}"), ARN, group).with_id(target_id(id))
}

fn memory_store(page_size: usize) -> (Store, Arc<MemoryStore>) {
	let tables = Arc::new(MemoryStore::with_page_size(page_size));

	(Store::new(tables.clone()), tables)
}

/// Delegates to a [`MemoryStore`] but fails deletes of the listed keys.
struct FlakyDeletes {
	inner: MemoryStore,
	failing: Vec<(Table, ItemKey)>,
}
impl TableBackend for FlakyDeletes {
	fn scan<'a>(
		&'a self,
		table: Table,
		filter: Option<&'a AttributeFilter>,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		self.inner.scan(table, filter, start)
	}

	fn query<'a>(
		&'a self,
		table: Table,
		partition: &'a str,
		start: Option<&'a PageToken>,
	) -> StoreFuture<'a, Page> {
		self.inner.query(table, partition, start)
	}

	fn get<'a>(&'a self, table: Table, key: &'a ItemKey) -> StoreFuture<'a, Option<Item>> {
		self.inner.get(table, key)
	}

	fn put(
		&self,
		table: Table,
		item: Item,
		precondition: Precondition,
	) -> StoreFuture<'_, ConditionalOutcome> {
		self.inner.put(table, item, precondition)
	}

	fn delete<'a>(
		&'a self,
		table: Table,
		key: &'a ItemKey,
		precondition: Precondition,
	) -> StoreFuture<'a, ConditionalOutcome> {
		if self.failing.iter().any(|(t, k)| *t == table && k == key) {
			return Box::pin(async {
				Err::<ConditionalOutcome, _>(StoreError::Backend { message: "throttled".into() })
			});
		}

		self.inner.delete(table, key, precondition)
	}
}

#[tokio::test]
async fn list_targets_follows_every_page() {
	let (store, tables) = memory_store(2);

	for id in ["t1", "t2", "t3", "t4", "t5"] {
		store.put_target(&role(id, "g1")).await.expect("Fixture target should be created.");
	}

	let targets = store.list_targets().await.expect("Listing targets should succeed.");

	assert_eq!(targets.len(), 5);
	// Pages of 2, 2, and 1 records.
	assert_eq!(tables.page_reads(), 3);
}

#[tokio::test]
async fn list_targets_is_stable_without_writes() {
	let (store, _) = memory_store(3);

	for id in ["a", "b", "c", "d"] {
		store.put_target(&role(id, "g1")).await.expect("Fixture target should be created.");
	}

	let first = store.list_targets().await.expect("First listing should succeed.");
	let second = store.list_targets().await.expect("Second listing should succeed.");
	let ids = |targets: &[Target]| {
		targets.iter().map(|t| t.target_id.to_string()).collect::<BTreeSet<_>>()
	};

	assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn filtered_scans_skip_empty_pages() {
	let (store, _) = memory_store(1);

	store.put_target(&role("t1", "g1")).await.expect("Fixture target should be created.");
	store.put_target(&role("t2", "g2")).await.expect("Fixture target should be created.");
	store.put_target(&role("t3", "g1")).await.expect("Fixture target should be created.");

	let matches = store
		.list_associations_for_groups(&["g2", "g2"])
		.await
		.expect("Group lookup should succeed.");

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].target.target_id.as_ref(), "t2");
	assert_eq!(matches[0].account_number, "123456789012");
}

#[tokio::test]
async fn invalid_target_type_writes_nothing() {
	let (store, tables) = memory_store(10);
	let mut target = role("t1", "g1");

	target.target_type = "group".into();

	let err = store.put_target(&target).await.expect_err("Unknown types must be rejected.");

	assert_eq!(err.kind(), ErrorKind::InvalidTargetType);
	assert!(tables.is_empty(Table::Targets));
}

#[tokio::test]
async fn conditional_writes_surface_distinct_kinds() {
	let (store, _) = memory_store(10);
	let target = role("t1", "g1");

	store.put_target(&target).await.expect("First create should succeed.");

	let duplicate = store.put_target(&target).await.expect_err("Second create must conflict.");

	assert_eq!(duplicate.kind(), ErrorKind::AlreadyExists);

	let missing = store
		.update_target(&role("t9", "g1"))
		.await
		.expect_err("Updating an unknown target must fail.");

	assert_eq!(missing.kind(), ErrorKind::NotFound);

	let gone = store.delete_target(&target_id("t9")).await.expect_err("Deleting nothing must fail.");

	assert_eq!(gone.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn update_target_replaces_every_attribute() {
	let (store, _) = memory_store(10);
	let mut target = role("t1", "g1");

	store.put_target(&target).await.expect("Fixture target should be created.");

	target.target_name = "renamed".into();
	target.target_group_mapping = "g2".into();

	store.update_target(&target).await.expect("Update should succeed.");

	let stored = store
		.get_target(&target_id("t1"))
		.await
		.expect("Lookup should succeed.")
		.expect("Target should still exist.");

	assert_eq!(stored, target);
}

#[tokio::test]
async fn deleting_a_target_removes_its_associations() {
	let (store, tables) = memory_store(2);

	store.put_target(&role("t1", "g1")).await.expect("Fixture target should be created.");
	store.put_target(&role("t2", "g1")).await.expect("Fixture target should be created.");

	for user in ["alice", "bob", "carol"] {
		store
			.put_association(&Association::new(username(user), target_id("t1")))
			.await
			.expect("Fixture association should be created.");
	}

	store
		.put_association(&Association::new(username("alice"), target_id("t2")))
		.await
		.expect("Fixture association should be created.");
	store.delete_target(&target_id("t1")).await.expect("Target delete should succeed.");

	for user in ["alice", "bob", "carol"] {
		assert!(
			!store
				.is_associated(&username(user), &target_id("t1"))
				.await
				.expect("Association lookup should succeed."),
			"{user} still holds the removed target"
		);
	}

	assert!(
		store.get_target_users(&target_id("t1")).await.expect("User lookup should succeed.").is_empty()
	);
	assert_eq!(tables.len(Table::UserAssociations), 1);
}

#[tokio::test]
async fn cascade_failures_do_not_abort_the_parent_delete() {
	let inner = MemoryStore::with_page_size(10);
	let backend = Arc::new(FlakyDeletes {
		inner: inner.clone(),
		failing: vec![(Table::UserAssociations, ItemKey::composite("bob", "t1"))],
	});
	let store = Store::new(backend);

	store.put_target(&role("t1", "g1")).await.expect("Fixture target should be created.");

	for user in ["alice", "bob"] {
		store
			.put_association(&Association::new(username(user), target_id("t1")))
			.await
			.expect("Fixture association should be created.");
	}

	store.delete_target(&target_id("t1")).await.expect("Parent delete should still succeed.");

	assert!(store.get_target(&target_id("t1")).await.expect("Lookup should succeed.").is_none());
	// The orphaned grant is tolerated.
	assert_eq!(inner.len(Table::UserAssociations), 1);
}

#[tokio::test]
async fn associations_require_an_existing_target() {
	let (store, _) = memory_store(10);
	let err = store
		.put_association(&Association::new(username("alice"), target_id("missing")))
		.await
		.expect_err("Grants for unknown targets must be rejected.");

	assert_eq!(err.kind(), ErrorKind::NotFound);

	store.put_target(&role("t1", "g1")).await.expect("Fixture target should be created.");

	let grant = Association::new(username("alice"), target_id("t1"));

	store.put_association(&grant).await.expect("Grant should be created.");

	assert_eq!(
		store.put_association(&grant).await.expect_err("Duplicate grant must conflict.").kind(),
		ErrorKind::AlreadyExists
	);

	store
		.delete_association(&username("alice"), &target_id("t1"))
		.await
		.expect("Grant removal should succeed.");

	assert_eq!(
		store
			.delete_association(&username("alice"), &target_id("t1"))
			.await
			.expect_err("Second removal must fail.")
			.kind(),
		ErrorKind::NotFound
	);
}

#[tokio::test]
async fn user_associations_are_detailed_and_skip_vanished_targets() {
	let inner = MemoryStore::with_page_size(1);
	let store = Store::new(Arc::new(inner.clone()));

	store.put_target(&role("t1", "g1")).await.expect("Fixture target should be created.");
	store.put_target(&role("t2", "g1")).await.expect("Fixture target should be created.");

	for id in ["t1", "t2"] {
		store
			.put_association(&Association::new(username("alice"), target_id(id)))
			.await
			.expect("Fixture association should be created.");
	}

	store
		.put_association(&Association::new(username("bob"), target_id("t1")))
		.await
		.expect("Fixture association should be created.");

	// Leave an orphaned grant behind by removing the target row directly.
	inner
		.delete(Table::Targets, &ItemKey::partition("t2"), Precondition::Exists)
		.await
		.expect("Raw delete should succeed.");

	let detailed = store
		.get_associations_for_user(&username("alice"))
		.await
		.expect("User associations should load.");

	assert_eq!(detailed.len(), 1);
	assert_eq!(detailed[0].association.target_id.as_ref(), "t1");
	assert_eq!(detailed[0].target_name, "role-t1");
	assert_eq!(detailed[0].account_number, "123456789012");
}

#[tokio::test]
async fn admins_are_created_once() {
	let (store, _) = memory_store(10);
	let admin = Admin::global(username("root"));

	store.put_admin(&admin).await.expect("Admin should be created.");

	assert_eq!(
		store.put_admin(&admin).await.expect_err("Duplicate admin must conflict.").kind(),
		ErrorKind::AlreadyExists
	);
	assert_eq!(
		store.get_admin(&username("root")).await.expect("Lookup should succeed."),
		Some(admin)
	);
	assert_eq!(store.get_admin(&username("nobody")).await.expect("Lookup should succeed."), None);
	assert_eq!(store.list_admins().await.expect("Listing admins should succeed.").len(), 1);
}

#[tokio::test]
async fn deleting_a_scoped_admin_removes_its_accounts() {
	let (store, tables) = memory_store(1);
	let scoped = username("ops");

	store.put_admin(&Admin::scoped(scoped.clone())).await.expect("Admin should be created.");
	store.put_admin(&Admin::scoped(username("other"))).await.expect("Admin should be created.");

	for account in ["111111111111", "222222222222"] {
		store.associate_admin(&scoped, account).await.expect("Scope should be created.");
	}

	store.associate_admin(&username("other"), "111111111111").await.expect("Scope should be created.");

	assert_eq!(
		store.get_admin_associations(&scoped).await.expect("Scopes should load."),
		vec!["111111111111".to_owned(), "222222222222".to_owned()]
	);
	assert_eq!(
		store.get_account_admins("111111111111").await.expect("Account admins should load."),
		vec![username("ops"), username("other")]
	);

	store.delete_admin(&scoped).await.expect("Admin delete should succeed.");

	assert!(store.get_admin_associations(&scoped).await.expect("Scopes should load.").is_empty());
	assert_eq!(tables.len(Table::AdminAssociations), 1);
	assert_eq!(
		store.delete_admin(&scoped).await.expect_err("Second delete must fail.").kind(),
		ErrorKind::NotFound
	);
}

#[tokio::test]
async fn deleting_a_global_admin_skips_the_scope_cascade() {
	let (store, tables) = memory_store(1);
	let root = username("root");
	let other = username("other");

	store.put_admin(&Admin::global(root.clone())).await.expect("Admin should be created.");
	store.put_admin(&Admin::scoped(other.clone())).await.expect("Admin should be created.");
	store.associate_admin(&other, "111111111111").await.expect("Scope should be created.");

	let reads = tables.page_reads();

	store.delete_admin(&root).await.expect("Global admin delete should succeed.");

	assert_eq!(tables.page_reads(), reads);
	assert_eq!(store.get_admin(&root).await.expect("Lookup should succeed."), None);
	assert_eq!(
		store.get_admin_associations(&other).await.expect("Scopes should load."),
		vec!["111111111111".to_owned()]
	);
	assert_eq!(tables.len(Table::AdminAssociations), 1);
}

#[tokio::test]
async fn admin_scope_cascade_failures_do_not_abort_the_parent_delete() {
	let inner = MemoryStore::with_page_size(1);
	let backend = Arc::new(FlakyDeletes {
		inner: inner.clone(),
		failing: vec![(Table::AdminAssociations, ItemKey::composite("ops", "111111111111"))],
	});
	let store = Store::new(backend);
	let scoped = username("ops");

	store.put_admin(&Admin::scoped(scoped.clone())).await.expect("Admin should be created.");

	for account in ["111111111111", "222222222222"] {
		store.associate_admin(&scoped, account).await.expect("Scope should be created.");
	}

	store.delete_admin(&scoped).await.expect("Parent delete should still succeed.");

	assert_eq!(store.get_admin(&scoped).await.expect("Lookup should succeed."), None);
	// The orphaned scope is tolerated.
	assert_eq!(inner.len(Table::AdminAssociations), 1);
	assert!(inner.is_empty(Table::Admins));
}

#[tokio::test]
async fn global_admins_hold_no_account_scopes() {
	let (store, _) = memory_store(10);
	let root = username("root");

	store.put_admin(&Admin::global(root.clone())).await.expect("Admin should be created.");

	let err = store
		.associate_admin(&root, "111111111111")
		.await
		.expect_err("Global admins cannot be scoped.");

	assert_eq!(err.kind(), ErrorKind::InvalidRequest);
	assert_eq!(
		store
			.associate_admin(&username("ghost"), "111111111111")
			.await
			.expect_err("Unknown admins cannot be scoped.")
			.kind(),
		ErrorKind::NotFound
	);
	assert!(store.list_admin_associations().await.expect("Scopes should load.").is_empty());
}

#[tokio::test]
async fn admin_group_mapping_is_a_replaceable_singleton() {
	let (store, _) = memory_store(10);

	assert_eq!(store.admin_group_mapping().await.expect("Lookup should succeed."), None);

	store.put_admin_group_mapping("portal-admins").await.expect("Mapping should be stored.");
	store.put_admin_group_mapping("cloud-admins").await.expect("Mapping should be replaced.");

	assert_eq!(
		store.admin_group_mapping().await.expect("Lookup should succeed.").as_deref(),
		Some("cloud-admins")
	);
}
