//! User-to-target grants.

// self
use crate::{
	_prelude::*,
	model::{Association, DetailedAssociation, Target, TargetId, Username},
	store::{self, AttributeFilter, ItemKey, Precondition, Store, StoreError, Table, admins::not_found},
};

impl Store {
	/// Lists every grant.
	pub async fn list_associations(&self) -> Result<Vec<Association>> {
		let items = self.scan_all(Table::UserAssociations, None).await?;

		Ok(store::decode_all(Table::UserAssociations, items)?)
	}

	/// Returns the user's grants annotated with target display data.
	///
	/// Grants whose target has since been removed are skipped.
	pub async fn get_associations_for_user(
		&self,
		username: &Username,
	) -> Result<Vec<DetailedAssociation>> {
		let items = self.query_all(Table::UserAssociations, username.as_ref()).await?;
		let grants: Vec<Association> = store::decode_all(Table::UserAssociations, items)?;
		let mut detailed = Vec::with_capacity(grants.len());

		for association in grants {
			let key = ItemKey::partition(association.target_id.as_ref());
			let Some(target) = self.get_item::<Target>(Table::Targets, &key).await? else {
				continue;
			};

			detailed.push(DetailedAssociation {
				account_number: target.account_number(),
				target_name: target.target_name,
				association,
			});
		}

		Ok(detailed)
	}

	/// Grants `username` the target; the target must exist and the pair must be new.
	pub async fn put_association(&self, association: &Association) -> Result<()> {
		let target = ItemKey::partition(association.target_id.as_ref());

		if self.backend().get(Table::Targets, &target).await?.is_none() {
			return Err(not_found(Table::Targets, &target));
		}

		Ok(self.put_item(Table::UserAssociations, association, Precondition::Absent).await?)
	}

	/// Revokes a grant; fails with `NotFound` when absent.
	pub async fn delete_association(&self, username: &Username, target_id: &TargetId) -> Result<()> {
		let key = ItemKey::composite(username.as_ref(), target_id.as_ref());

		Ok(self.delete_item(Table::UserAssociations, &key).await?)
	}

	/// Returns `true` when `username` holds a direct grant for `target_id`.
	pub async fn is_associated(&self, username: &Username, target_id: &TargetId) -> Result<bool> {
		let key = ItemKey::composite(username.as_ref(), target_id.as_ref());

		Ok(self.backend().get(Table::UserAssociations, &key).await?.is_some())
	}

	/// Lists the users directly granted `target_id`.
	pub async fn get_target_users(&self, target_id: &TargetId) -> Result<Vec<Username>> {
		let filter = AttributeFilter::equals("assoc_id", target_id.as_ref());
		let items = self.scan_all(Table::UserAssociations, Some(&filter)).await?;
		let grants: Vec<Association> = store::decode_all(Table::UserAssociations, items)?;

		Ok(grants.into_iter().map(|grant| grant.username).collect())
	}

	pub(super) async fn target_user_keys(
		&self,
		target_id: &TargetId,
	) -> Result<Vec<ItemKey>, StoreError> {
		let filter = AttributeFilter::equals("assoc_id", target_id.as_ref());

		self.scan_all(Table::UserAssociations, Some(&filter))
			.await?
			.iter()
			.map(|item| ItemKey::of(Table::UserAssociations, item))
			.collect()
	}
}
