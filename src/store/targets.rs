//! Target records and their group-based lookup.

// std
use std::collections::BTreeSet;
// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	model::{DetailedTarget, Target, TargetId, TargetType},
	obs,
	store::{self, AttributeFilter, ItemKey, Precondition, Store, Table},
};

impl Store {
	/// Lists every target.
	pub async fn list_targets(&self) -> Result<Vec<Target>> {
		let items = self.scan_all(Table::Targets, None).await?;

		Ok(store::decode_all(Table::Targets, items)?)
	}

	/// Fetches one target.
	pub async fn get_target(&self, id: &TargetId) -> Result<Option<Target>> {
		Ok(self.get_item(Table::Targets, &ItemKey::partition(id.as_ref())).await?)
	}

	/// Creates a target after validating it; nothing is written when validation fails.
	pub async fn put_target(&self, target: &Target) -> Result<()> {
		validate_target(target)?;

		Ok(self.put_item(Table::Targets, target, Precondition::Absent).await?)
	}

	/// Replaces every attribute of an existing target, matched by its immutable `target_id`.
	pub async fn update_target(&self, target: &Target) -> Result<()> {
		validate_target(target)?;

		Ok(self.put_item(Table::Targets, target, Precondition::Exists).await?)
	}

	/// Removes a target and, best-effort, every association that grants it.
	pub async fn delete_target(&self, id: &TargetId) -> Result<()> {
		let key = ItemKey::partition(id.as_ref());

		self.delete_item(Table::Targets, &key).await?;

		let users = match self.target_user_keys(id).await {
			Ok(users) => users,
			Err(e) => {
				obs::warn_cascade_skipped(Table::UserAssociations, &key, &e);

				return Ok(());
			},
		};

		for child in users {
			if let Err(e) = self.delete_item(Table::UserAssociations, &child).await {
				obs::warn_cascade_skipped(Table::UserAssociations, &child, &e);
			}
		}

		Ok(())
	}

	/// Returns every target mapped to one of `groups`, annotated with its account number.
	///
	/// Duplicate groups are looked up once and results are ordered by target identifier.
	pub async fn list_associations_for_groups<S>(&self, groups: &[S]) -> Result<Vec<DetailedTarget>>
	where
		S: AsRef<str>,
	{
		let distinct = groups.iter().map(AsRef::as_ref).collect::<BTreeSet<_>>();
		let mut found = BTreeMap::new();

		for group in distinct {
			let filter = AttributeFilter::equals("target_group_mapping", group);
			let items = self.scan_all(Table::Targets, Some(&filter)).await?;

			for target in store::decode_all::<Target>(Table::Targets, items)? {
				found.entry(target.target_id.clone()).or_insert(target);
			}
		}

		Ok(found.into_values().map(DetailedTarget::from).collect())
	}
}

fn validate_target(target: &Target) -> Result<()> {
	match target.kind()? {
		TargetType::Role if target.target_fed_creds.is_some() =>
			Err(Error::invalid_request("role targets cannot carry federated credentials")),
		TargetType::Role => Ok(()),
		TargetType::User => {
			let ciphertext = target.target_fed_creds.as_deref().unwrap_or_default();

			if ciphertext.is_empty() {
				return Err(Error::invalid_request("user targets require federated credentials"));
			}
			// Plaintext `access|secret` pairs never decode as base64.
			if STANDARD.decode(ciphertext).is_err() {
				return Err(Error::invalid_request(
					"federated credentials must be base64 ciphertext",
				));
			}

			Ok(())
		},
	}
}
