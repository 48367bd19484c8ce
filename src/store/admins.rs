//! Administrator records, their account scopes, and the admin-group mapping.

// self
use crate::{
	_prelude::*,
	model::{Admin, AdminAssociation, AdminGroupRecord, Username},
	obs,
	store::{self, AttributeFilter, ItemKey, Precondition, Store, Table},
};

impl Store {
	/// Lists every administrator.
	pub async fn list_admins(&self) -> Result<Vec<Admin>> {
		let items = self.scan_all(Table::Admins, None).await?;

		Ok(store::decode_all(Table::Admins, items)?)
	}

	/// Fetches one administrator.
	pub async fn get_admin(&self, username: &Username) -> Result<Option<Admin>> {
		Ok(self.get_item(Table::Admins, &ItemKey::partition(username.as_ref())).await?)
	}

	/// Creates an administrator; fails with `AlreadyExists` when the username is taken.
	pub async fn put_admin(&self, admin: &Admin) -> Result<()> {
		Ok(self.put_item(Table::Admins, admin, Precondition::Absent).await?)
	}

	/// Removes an administrator.
	///
	/// Scoped administrators also lose their account associations. Those child deletes are
	/// best-effort: a failure is logged and skipped without undoing the parent delete.
	pub async fn delete_admin(&self, username: &Username) -> Result<()> {
		let key = ItemKey::partition(username.as_ref());
		let Some(admin) = self.get_item::<Admin>(Table::Admins, &key).await? else {
			return Err(not_found(Table::Admins, &key));
		};

		self.delete_item(Table::Admins, &key).await?;

		if admin.global_admin {
			return Ok(());
		}

		let scopes = match self.query_all(Table::AdminAssociations, username.as_ref()).await {
			Ok(items) => items,
			Err(e) => {
				obs::warn_cascade_skipped(Table::AdminAssociations, &key, &e);

				return Ok(());
			},
		};

		for item in scopes {
			let child = match ItemKey::of(Table::AdminAssociations, &item) {
				Ok(child) => child,
				Err(e) => {
					obs::warn_cascade_skipped(Table::AdminAssociations, &key, &e);

					continue;
				},
			};

			if let Err(e) = self.delete_item(Table::AdminAssociations, &child).await {
				obs::warn_cascade_skipped(Table::AdminAssociations, &child, &e);
			}
		}

		Ok(())
	}

	/// Lists every administrator account scope.
	pub async fn list_admin_associations(&self) -> Result<Vec<AdminAssociation>> {
		let items = self.scan_all(Table::AdminAssociations, None).await?;

		Ok(store::decode_all(Table::AdminAssociations, items)?)
	}

	/// Returns the account numbers a scoped administrator may manage.
	pub async fn get_admin_associations(&self, username: &Username) -> Result<Vec<String>> {
		let items = self.query_all(Table::AdminAssociations, username.as_ref()).await?;
		let scopes: Vec<AdminAssociation> = store::decode_all(Table::AdminAssociations, items)?;

		Ok(scopes.into_iter().map(|scope| scope.account_number).collect())
	}

	/// Scopes an existing, non-global administrator to `account_number`.
	pub async fn associate_admin(&self, username: &Username, account_number: &str) -> Result<()> {
		if account_number.is_empty() {
			return Err(Error::invalid_request("account number cannot be empty"));
		}

		let key = ItemKey::partition(username.as_ref());
		let Some(admin) = self.get_item::<Admin>(Table::Admins, &key).await? else {
			return Err(not_found(Table::Admins, &key));
		};

		if admin.global_admin {
			return Err(Error::invalid_request(format!(
				"global admin `{username}` cannot hold account associations"
			)));
		}

		let scope =
			AdminAssociation { username: username.clone(), account_number: account_number.into() };

		Ok(self.put_item(Table::AdminAssociations, &scope, Precondition::Absent).await?)
	}

	/// Removes one administrator account scope; fails with `NotFound` when absent.
	pub async fn disassociate_admin(&self, username: &Username, account_number: &str) -> Result<()> {
		let key = ItemKey::composite(username.as_ref(), account_number);

		Ok(self.delete_item(Table::AdminAssociations, &key).await?)
	}

	/// Lists the administrators scoped to `account_number`.
	pub async fn get_account_admins(&self, account_number: &str) -> Result<Vec<Username>> {
		let filter = AttributeFilter::equals("account_number", account_number);
		let items = self.scan_all(Table::AdminAssociations, Some(&filter)).await?;
		let scopes: Vec<AdminAssociation> = store::decode_all(Table::AdminAssociations, items)?;

		Ok(scopes.into_iter().map(|scope| scope.username).collect())
	}

	/// Stores the SSO group whose members are treated as global administrators.
	pub async fn put_admin_group_mapping(&self, group: &str) -> Result<()> {
		if group.is_empty() {
			return Err(Error::invalid_request("admin group cannot be empty"));
		}

		let record = AdminGroupRecord { item: AdminGroupRecord::ITEM.into(), value: group.into() };

		Ok(self.put_item(Table::Values, &record, Precondition::None).await?)
	}

	/// Returns the configured admin group, if any.
	pub async fn admin_group_mapping(&self) -> Result<Option<String>> {
		let record = self
			.get_item::<AdminGroupRecord>(Table::Values, &ItemKey::partition(AdminGroupRecord::ITEM))
			.await?;

		Ok(record.map(|record| record.value))
	}
}

pub(super) fn not_found(table: Table, key: &ItemKey) -> Error {
	store::StoreError::NotFound { table: table.name().into(), key: key.to_string() }.into()
}
