//! Envelope encryption of long-lived federation secrets.
//!
//! The broker never holds key material. [`SecretCipher`] hands plaintext to a
//! [`KeyManagement`] service and stores the returned ciphertext as standard base64.

#[cfg(feature = "aws")] pub mod kms;

#[cfg(feature = "aws")] pub use kms::KmsKeyManagement;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	error::{UpstreamError, UpstreamFuture},
	model::SecretString,
};

/// Separator between the access key ID and the secret key in a federation secret.
pub const FEDERATED_KEY_SEPARATOR: char = '|';

/// Key-management service contract (KMS-equivalent).
pub trait KeyManagement
where
	Self: Send + Sync,
{
	/// Encrypts `plaintext` under `key_id`, returning raw ciphertext bytes.
	fn encrypt<'a>(&'a self, key_id: &'a str, plaintext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>>;

	/// Decrypts raw ciphertext bytes; the key is resolved from the ciphertext itself.
	fn decrypt<'a>(&'a self, ciphertext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>>;
}

/// Long-lived IAM user keys recovered from a federation secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FederatedKeys {
	/// Access key ID.
	pub access_key_id: String,
	/// Secret access key.
	pub secret_access_key: SecretString,
}
impl FederatedKeys {
	/// Splits a decrypted `access|secret` payload.
	///
	/// Exactly two fields are accepted; anything else is [`Error::MalformedSecret`].
	pub fn parse(plaintext: &str) -> Result<Self> {
		let mut fields = plaintext.split(FEDERATED_KEY_SEPARATOR);

		match (fields.next(), fields.next(), fields.next()) {
			(Some(access), Some(secret), None) => Ok(Self {
				access_key_id: access.to_owned(),
				secret_access_key: SecretString::new(secret),
			}),
			_ => Err(Error::MalformedSecret),
		}
	}
}

/// Encrypts and decrypts federation secrets through a [`KeyManagement`] service.
#[derive(Clone)]
pub struct SecretCipher {
	kms: Arc<dyn KeyManagement>,
	default_key_id: Option<String>,
}
impl SecretCipher {
	/// Wraps a key-management service.
	pub fn new(kms: Arc<dyn KeyManagement>) -> Self {
		Self { kms, default_key_id: None }
	}

	/// Sets the key used by [`SecretCipher::encrypt_with_default`].
	pub fn with_default_key(mut self, key_id: impl Into<String>) -> Self {
		self.default_key_id = Some(key_id.into());

		self
	}

	/// Encrypts `plaintext` under `key_id` and returns base64 ciphertext.
	pub async fn encrypt(&self, key_id: &str, plaintext: &str) -> Result<String> {
		if key_id.is_empty() {
			return Err(Error::invalid_request("encryption key id cannot be empty"));
		}

		let ciphertext = self.kms.encrypt(key_id, plaintext.as_bytes()).await?;

		Ok(STANDARD.encode(ciphertext))
	}

	/// Encrypts under the configured default key.
	pub async fn encrypt_with_default(&self, plaintext: &str) -> Result<String> {
		let Some(key_id) = self.default_key_id.as_deref() else {
			return Err(Error::invalid_request("no default encryption key is configured"));
		};

		self.encrypt(key_id, plaintext).await
	}

	/// Decrypts base64 ciphertext.
	///
	/// Malformed base64, a provider refusal, and non UTF-8 plaintext all surface as
	/// [`Error::DecryptionFailed`].
	pub async fn decrypt(&self, ciphertext: &str) -> Result<SecretString> {
		let raw = STANDARD
			.decode(ciphertext.trim())
			.map_err(|e| Error::DecryptionFailed { reason: format!("invalid base64: {e}") })?;
		let plaintext = self
			.kms
			.decrypt(&raw)
			.await
			.map_err(|e: UpstreamError| Error::DecryptionFailed { reason: e.message })?;
		let plaintext = String::from_utf8(plaintext)
			.map_err(|_| Error::DecryptionFailed { reason: "plaintext is not UTF-8".into() })?;

		Ok(SecretString::new(plaintext))
	}

	/// Builds and encrypts the `access|secret` payload stored on `user` targets.
	pub async fn encrypt_federated_keys(
		&self,
		key_id: &str,
		access_key_id: &str,
		secret_access_key: &str,
	) -> Result<String> {
		for (field, value) in [("access key id", access_key_id), ("secret access key", secret_access_key)]
		{
			if value.is_empty() || value.contains(FEDERATED_KEY_SEPARATOR) {
				return Err(Error::invalid_request(format!(
					"{field} must be non-empty and must not contain `{FEDERATED_KEY_SEPARATOR}`"
				)));
			}
		}

		self.encrypt(key_id, &format!("{access_key_id}{FEDERATED_KEY_SEPARATOR}{secret_access_key}"))
			.await
	}

	/// Decrypts a federation secret and splits it into its two keys.
	pub async fn decrypt_federated_keys(&self, ciphertext: &str) -> Result<FederatedKeys> {
		let plaintext = self.decrypt(ciphertext).await?;

		FederatedKeys::parse(plaintext.expose())
	}
}
impl Debug for SecretCipher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecretCipher").field("default_key_id", &self.default_key_id).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn federated_keys_need_exactly_two_fields() {
		let keys = FederatedKeys::parse("AKIAABC|secret123").expect("Two fields should parse.");

		assert_eq!(keys.access_key_id, "AKIAABC");
		assert_eq!(keys.secret_access_key.expose(), "secret123");

		for malformed in ["AKIAABC", "a|b|c", ""] {
			assert!(matches!(FederatedKeys::parse(malformed), Err(Error::MalformedSecret)));
		}
	}

	#[test]
	fn empty_halves_still_split() {
		let keys = FederatedKeys::parse("|secret").expect("An empty access key still splits.");

		assert_eq!(keys.access_key_id, "");
	}
}
