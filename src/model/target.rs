//! Targets: assumable IAM roles and federated IAM users.

// self
use crate::{_prelude::*, model::TargetId};

/// How credentials for a target are minted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
	/// IAM role reached through role assumption.
	Role,
	/// IAM user reached through a federation token.
	User,
}
impl TargetType {
	/// Returns the persisted label.
	pub const fn as_str(self) -> &'static str {
		match self {
			TargetType::Role => "role",
			TargetType::User => "user",
		}
	}
}
impl Display for TargetType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for TargetType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"role" => Ok(Self::Role),
			"user" => Ok(Self::User),
			other => Err(Error::InvalidTargetType { value: other.to_owned() }),
		}
	}
}

/// Assumable AWS identity reachable through the broker.
///
/// `target_type` is kept as the raw label so records written by older tooling still load; use
/// [`Target::kind`] to get the validated [`TargetType`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
	/// Opaque unique key.
	pub target_id: TargetId,
	/// Display name; also the federation token name for `user` targets.
	pub target_name: String,
	/// IAM role or user ARN.
	pub target_arn: String,
	/// `role` or `user`.
	pub target_type: String,
	/// External ID required by the trust policy, if any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_external_id: Option<String>,
	/// Base64 ciphertext of `access|secret`, only for `user` targets.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub target_fed_creds: Option<String>,
	/// Group identifier whose members may become this target.
	pub target_group_mapping: String,
}
impl Target {
	/// Builds a role target with a freshly generated identifier.
	pub fn role(
		name: impl Into<String>,
		arn: impl Into<String>,
		group_mapping: impl Into<String>,
	) -> Self {
		Self {
			target_id: TargetId::generate(),
			target_name: name.into(),
			target_arn: arn.into(),
			target_type: TargetType::Role.as_str().into(),
			target_external_id: None,
			target_fed_creds: None,
			target_group_mapping: group_mapping.into(),
		}
	}

	/// Builds a federated-user target carrying already-encrypted long-lived keys.
	pub fn user(
		name: impl Into<String>,
		arn: impl Into<String>,
		group_mapping: impl Into<String>,
		federated_ciphertext: impl Into<String>,
	) -> Self {
		Self {
			target_id: TargetId::generate(),
			target_name: name.into(),
			target_arn: arn.into(),
			target_type: TargetType::User.as_str().into(),
			target_external_id: None,
			target_fed_creds: Some(federated_ciphertext.into()),
			target_group_mapping: group_mapping.into(),
		}
	}

	/// Overrides the generated identifier.
	pub fn with_id(mut self, id: TargetId) -> Self {
		self.target_id = id;

		self
	}

	/// Attaches an external ID.
	pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
		self.target_external_id = Some(external_id.into());

		self
	}

	/// Returns the validated target type.
	pub fn kind(&self) -> Result<TargetType> {
		self.target_type.parse()
	}

	/// Returns the account number embedded in the ARN, or an empty string.
	pub fn account_number(&self) -> String {
		account_number(&self.target_arn)
	}

	/// Returns `true` when the target's group mapping is one of `groups`.
	pub fn mapped_to_any<S>(&self, groups: &[S]) -> bool
	where
		S: AsRef<str>,
	{
		groups.iter().any(|group| group.as_ref() == self.target_group_mapping)
	}
}
impl Debug for Target {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Target")
			.field("target_id", &self.target_id)
			.field("target_name", &self.target_name)
			.field("target_arn", &self.target_arn)
			.field("target_type", &self.target_type)
			.field("target_external_id", &self.target_external_id)
			.field("target_fed_creds", &self.target_fed_creds.as_ref().map(|_| "<redacted>"))
			.field("target_group_mapping", &self.target_group_mapping)
			.finish()
	}
}

/// Target annotated with the account number derived from its ARN.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetailedTarget {
	/// Underlying target.
	pub target: Target,
	/// Account number, empty when the ARN is malformed.
	pub account_number: String,
}
impl From<Target> for DetailedTarget {
	fn from(target: Target) -> Self {
		let account_number = target.account_number();

		Self { target, account_number }
	}
}

/// Extracts the account field of `arn:partition:service:region:account:resource`.
///
/// Any ARN that does not split into exactly six colon-delimited fields yields an empty string.
pub fn account_number(arn: &str) -> String {
	let fields = arn.split(':').collect::<Vec<_>>();

	if fields.len() != 6 {
		return String::new();
	}

	fields[4].to_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn account_number_reads_fifth_field() {
		assert_eq!(account_number("arn:aws:iam::123456789012:role/S3Access"), "123456789012");
		assert_eq!(account_number("arn:aws:sts::123456789012:user/Bobo"), "123456789012");
	}

	#[test]
	fn malformed_arns_yield_empty_account() {
		assert_eq!(account_number("not-an-arn"), "");
		assert_eq!(account_number("arn:aws:iam::123456789012:role/a:b"), "");
		assert_eq!(account_number(""), "");
	}

	#[test]
	fn target_type_parsing_rejects_unknown_labels() {
		assert_eq!("role".parse::<TargetType>().expect("role should parse."), TargetType::Role);
		assert_eq!("user".parse::<TargetType>().expect("user should parse."), TargetType::User);

		let err = "group".parse::<TargetType>().expect_err("group is not a target type.");

		assert!(matches!(err, Error::InvalidTargetType { ref value } if value == "group"));
	}

	#[test]
	fn target_serializes_with_persisted_field_names() {
		let target = Target::role("S3", "arn:aws:iam::123456789012:role/S3Access", "g1")
			.with_id(TargetId::new("t1").expect("Target id fixture should be valid."));
		let value = serde_json::to_value(&target).expect("Target should serialize.");

		assert_eq!(value["target_id"], "t1");
		assert_eq!(value["target_type"], "role");
		assert_eq!(value["target_group_mapping"], "g1");
		assert!(value.get("target_fed_creds").is_none());
	}

	#[test]
	fn debug_redacts_federated_ciphertext() {
		let target = Target::user("bot", "arn:aws:iam::123456789012:user/bot", "g1", "Y2lwaGVy");

		assert!(!format!("{target:?}").contains("Y2lwaGVy"));
	}

	#[test]
	fn group_membership_check() {
		let target = Target::role("S3", "arn:aws:iam::123456789012:role/S3Access", "g1");

		assert!(target.mapped_to_any(&["g0", "g1"]));
		assert!(!target.mapped_to_any(&["g2"]));
		assert!(!target.mapped_to_any::<&str>(&[]));
	}
}
