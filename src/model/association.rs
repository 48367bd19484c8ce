//! User-to-target grants.

// self
use crate::{
	_prelude::*,
	model::{TargetId, Username},
};

/// Grant linking a user to a target. Unique per `(username, assoc_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Association {
	/// Granted user.
	pub username: Username,
	/// Target the user may become.
	#[serde(rename = "assoc_id")]
	pub target_id: TargetId,
}
impl Association {
	/// Creates a new grant.
	pub fn new(username: Username, target_id: TargetId) -> Self {
		Self { username, target_id }
	}
}

/// Association annotated with the target's display data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailedAssociation {
	/// Underlying grant.
	pub association: Association,
	/// Target display name.
	pub target_name: String,
	/// Account number derived from the target ARN.
	pub account_number: String,
}

/// Authenticated caller as handed over by the SSO layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	/// Verified username.
	pub username: Username,
	/// Group identifiers in the order the identity provider listed them.
	pub groups: Vec<String>,
}
impl Identity {
	/// Creates an identity from a username and its groups.
	pub fn new<I, S>(username: Username, groups: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { username, groups: groups.into_iter().map(Into::into).collect() }
	}

	/// Returns `true` when the identity belongs to `group`.
	pub fn in_group(&self, group: &str) -> bool {
		self.groups.iter().any(|g| g == group)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn association_uses_assoc_id_field() {
		let association = Association::new(
			Username::new("alice").expect("Username fixture should be valid."),
			TargetId::new("t1").expect("Target fixture should be valid."),
		);
		let value = serde_json::to_value(&association).expect("Association should serialize.");

		assert_eq!(value["username"], "alice");
		assert_eq!(value["assoc_id"], "t1");
	}

	#[test]
	fn identity_group_lookup() {
		let identity = Identity::new(
			Username::new("alice").expect("Username fixture should be valid."),
			["g1", "g2"],
		);

		assert!(identity.in_group("g2"));
		assert!(!identity.in_group("g3"));
	}
}
