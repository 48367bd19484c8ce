//! Short-lived credential issuance, branching on the target type.
//!
//! - `role` targets: role assumption with the requester as session name.
//! - `user` targets: the stored federation secret is decrypted, a secondary credential scope is
//!   opened with those long-lived keys, and a federation token is issued under the configured
//!   policy.

#[cfg(feature = "aws")] pub mod sts;

#[cfg(feature = "aws")] pub use sts::StsTokenService;

// self
use crate::{
	_prelude::*,
	cipher::{FederatedKeys, SecretCipher},
	error::UpstreamFuture,
	model::{SecretString, Target, TargetType, Username},
};

/// Broad allow-all policy attached to federation tokens unless configured otherwise.
///
/// The effective permissions are the intersection with the federated IAM user's own policies.
pub const DEFAULT_FEDERATION_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":["*"],"Resource":"*"}]}"#;

const ROLE_SESSION_NAME_MAX: usize = 64;
const FEDERATION_NAME_MAX: usize = 32;
const STS_NAME_MIN: usize = 2;

/// STS-equivalent issuance contract.
pub trait TokenService
where
	Self: Send + Sync,
{
	/// Assumes an IAM role with the broker's own credentials.
	fn assume_role<'a>(&'a self, request: &'a AssumeRoleRequest) -> UpstreamFuture<'a, CredentialBundle>;

	/// Opens a credential scope with `keys` and issues a federation token from it.
	fn federation_token<'a>(
		&'a self,
		keys: &'a FederatedKeys,
		request: &'a FederationTokenRequest,
	) -> UpstreamFuture<'a, CredentialBundle>;
}

/// Requested credential lifetime in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionDuration(u32);
impl SessionDuration {
	/// Wraps a positive number of seconds.
	pub fn from_secs(secs: u32) -> Option<Self> {
		(secs > 0).then_some(Self(secs))
	}

	/// Parses the raw `duration` parameter.
	///
	/// Empty, non-numeric, zero, or out-of-range input yields `None`, meaning "use the
	/// provider's default lifetime".
	pub fn parse(input: &str) -> Option<Self> {
		input.trim().parse::<u32>().ok().and_then(Self::from_secs)
	}

	/// Seconds as the signed integer the STS API expects.
	pub fn as_secs_i32(self) -> i32 {
		i32::try_from(self.0).unwrap_or(i32::MAX)
	}

	/// Seconds.
	pub fn as_secs(self) -> u32 {
		self.0
	}
}

/// Role-assumption parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssumeRoleRequest {
	/// Role to assume.
	pub role_arn: String,
	/// Session name recorded in CloudTrail (the requester).
	pub session_name: String,
	/// External ID required by the trust policy, if any.
	pub external_id: Option<String>,
	/// Requested lifetime; `None` uses the provider default.
	pub duration: Option<SessionDuration>,
}

/// Federation-token parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederationTokenRequest {
	/// Federated user name (the target name).
	pub name: String,
	/// Inline session policy.
	pub policy: String,
	/// Requested lifetime; `None` uses the provider default.
	pub duration: Option<SessionDuration>,
}

/// Temporary AWS credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialBundle {
	/// Access key ID.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: SecretString,
	/// Session token.
	pub session_token: SecretString,
	/// Absolute expiry.
	pub expiration: OffsetDateTime,
}

/// Mints credentials for a target.
#[derive(Clone)]
pub struct CredentialMinter {
	cipher: SecretCipher,
	tokens: Arc<dyn TokenService>,
	federation_policy: String,
}
impl CredentialMinter {
	/// Creates a minter using [`DEFAULT_FEDERATION_POLICY`].
	pub fn new(cipher: SecretCipher, tokens: Arc<dyn TokenService>) -> Self {
		Self { cipher, tokens, federation_policy: DEFAULT_FEDERATION_POLICY.into() }
	}

	/// Overrides the policy attached to federation tokens.
	pub fn with_federation_policy(mut self, policy: impl Into<String>) -> Self {
		self.federation_policy = policy.into();

		self
	}

	/// Policy attached to federation tokens.
	pub fn federation_policy(&self) -> &str {
		&self.federation_policy
	}

	/// Issues credentials for `target` on behalf of `requester`.
	pub async fn mint(
		&self,
		target: &Target,
		requester: &Username,
		duration: Option<SessionDuration>,
	) -> Result<CredentialBundle> {
		match target.kind()? {
			TargetType::Role => {
				let request = AssumeRoleRequest {
					role_arn: target.target_arn.clone(),
					session_name: sts_name(requester, ROLE_SESSION_NAME_MAX),
					external_id: target.target_external_id.clone(),
					duration,
				};

				Ok(self.tokens.assume_role(&request).await?)
			},
			TargetType::User => {
				let Some(ciphertext) = target.target_fed_creds.as_deref() else {
					return Err(Error::MalformedSecret);
				};
				let keys = self.cipher.decrypt_federated_keys(ciphertext).await?;
				let request = FederationTokenRequest {
					name: sts_name(&target.target_name, FEDERATION_NAME_MAX),
					policy: self.federation_policy.clone(),
					duration,
				};

				Ok(self.tokens.federation_token(&keys, &request).await?)
			},
		}
	}
}
impl Debug for CredentialMinter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialMinter").field("cipher", &self.cipher).finish_non_exhaustive()
	}
}

/// Restricts `raw` to the STS name alphabet `[\w+=,.@-]` and its length limits.
fn sts_name(raw: &str, max: usize) -> String {
	let mut name = raw
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || "_+=,.@-".contains(c) { c } else { '-' })
		.take(max)
		.collect::<String>();

	while name.len() < STS_NAME_MIN {
		name.push('_');
	}

	name
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn durations_fall_back_to_provider_default() {
		assert_eq!(SessionDuration::parse("3600").map(SessionDuration::as_secs), Some(3600));
		assert_eq!(SessionDuration::parse(" 900 "), SessionDuration::from_secs(900));

		for raw in ["", "abc", "0", "-5", "99999999999"] {
			assert_eq!(SessionDuration::parse(raw), None, "`{raw}` should use the default");
		}
	}

	#[test]
	fn sts_names_are_sanitized() {
		assert_eq!(sts_name("alice@example.com", 64), "alice@example.com");
		assert_eq!(sts_name("Prod Admin (ro)", 32), "Prod-Admin--ro-");
		assert_eq!(sts_name(&"a".repeat(80), 64).len(), 64);
	}

	#[test]
	fn short_sts_names_are_padded() {
		assert_eq!(sts_name("a", 64), "a_");
		assert_eq!(sts_name("", 32), "__");
		assert_eq!(sts_name("ab", 32), "ab");
	}
}
