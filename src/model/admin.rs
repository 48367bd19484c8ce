//! Administrators and their account-scoping grants.

// self
use crate::{_prelude::*, model::Username};

/// Portal administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
	/// Unique key.
	pub username: Username,
	/// Global admins manage every account and never hold [`AdminAssociation`]s.
	#[serde(default)]
	pub global_admin: bool,
}
impl Admin {
	/// Builds a global administrator.
	pub fn global(username: Username) -> Self {
		Self { username, global_admin: true }
	}

	/// Builds an administrator scoped through [`AdminAssociation`]s.
	pub fn scoped(username: Username) -> Self {
		Self { username, global_admin: false }
	}
}

/// Grant scoping a non-global administrator to one AWS account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdminAssociation {
	/// Administrator username.
	pub username: Username,
	/// Account the administrator may manage.
	pub account_number: String,
}

/// Singleton record naming the SSO group whose members are global administrators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AdminGroupRecord {
	pub item: String,
	pub value: String,
}
impl AdminGroupRecord {
	pub(crate) const ITEM: &'static str = "admins_group";
}
