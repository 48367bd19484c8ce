//! Group-based authorization: which targets an identity may become, and what it may administer.

// self
use crate::{
	_prelude::*,
	model::{DetailedTarget, Identity, Target, TargetId},
	store::Store,
};

/// Administrative reach of an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminAccess {
	/// Not an administrator.
	None,
	/// Manages every account, through the admin group or a global admin record.
	Global,
	/// Manages only the listed accounts.
	Scoped(Vec<String>),
}
impl AdminAccess {
	/// Returns `true` when the identity administers anything at all.
	pub fn is_admin(&self) -> bool {
		!matches!(self, AdminAccess::None)
	}

	/// Returns `true` when targets in `account_number` may be managed.
	pub fn can_manage(&self, account_number: &str) -> bool {
		match self {
			AdminAccess::None => false,
			AdminAccess::Global => true,
			AdminAccess::Scoped(accounts) => accounts.iter().any(|a| a == account_number),
		}
	}
}

/// Resolves group memberships and direct grants against the [`Store`].
#[derive(Clone, Debug)]
pub struct AuthorizationResolver {
	store: Store,
}
impl AuthorizationResolver {
	/// Creates a resolver reading from `store`.
	pub fn new(store: Store) -> Self {
		Self { store }
	}

	/// Every target mapped to one of `groups`, annotated with its account number.
	pub async fn allowed_targets<S>(&self, groups: &[S]) -> Result<Vec<DetailedTarget>>
	where
		S: AsRef<str>,
	{
		self.store.list_associations_for_groups(groups).await
	}

	/// `true` iff the target exists and its group mapping is one of `groups`.
	///
	/// An absent target is not an error.
	pub async fn allowed_to_become<S>(&self, groups: &[S], target_id: &TargetId) -> Result<bool>
	where
		S: AsRef<str>,
	{
		Ok(self.store.get_target(target_id).await?.is_some_and(|t| t.mapped_to_any(groups)))
	}

	/// Loads the target when `identity` may become it through a group mapping or a direct grant.
	///
	/// Absent targets and missing permissions both surface as [`Error::Unauthorized`] so callers
	/// cannot probe which identifiers exist.
	pub async fn authorize(&self, identity: &Identity, target_id: &TargetId) -> Result<Target> {
		let unauthorized = || Error::Unauthorized {
			username: identity.username.to_string(),
			target: target_id.to_string(),
		};
		let target = self.store.get_target(target_id).await?.ok_or_else(unauthorized)?;

		if target.mapped_to_any(&identity.groups)
			|| self.store.is_associated(&identity.username, target_id).await?
		{
			Ok(target)
		} else {
			Err(unauthorized())
		}
	}

	/// `true` when one of `groups` is the configured admin group.
	pub async fn is_admin_group_member<S>(&self, groups: &[S]) -> Result<bool>
	where
		S: AsRef<str>,
	{
		let Some(admin_group) = self.store.admin_group_mapping().await? else {
			return Ok(false);
		};

		Ok(groups.iter().any(|group| group.as_ref() == admin_group))
	}

	/// Resolves what `identity` may administer.
	pub async fn admin_access(&self, identity: &Identity) -> Result<AdminAccess> {
		if self.is_admin_group_member(&identity.groups).await? {
			return Ok(AdminAccess::Global);
		}

		match self.store.get_admin(&identity.username).await? {
			None => Ok(AdminAccess::None),
			Some(admin) if admin.global_admin => Ok(AdminAccess::Global),
			Some(admin) =>
				Ok(AdminAccess::Scoped(self.store.get_admin_associations(&admin.username).await?)),
		}
	}

	/// `true` when `identity` may manage `target`.
	pub async fn can_manage(&self, identity: &Identity, target: &Target) -> Result<bool> {
		Ok(self.admin_access(identity).await?.can_manage(&target.account_number()))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scoped_access_checks_accounts() {
		let access = AdminAccess::Scoped(vec!["123456789012".into()]);

		assert!(access.is_admin());
		assert!(access.can_manage("123456789012"));
		assert!(!access.can_manage("210987654321"));
		assert!(AdminAccess::Global.can_manage(""));
		assert!(!AdminAccess::None.can_manage("123456789012"));
	}
}
