//! AWS KMS adapter for [`KeyManagement`] (enabled by the `aws` feature).

// crates.io
use aws_sdk_kms::{Client, error::DisplayErrorContext, primitives::Blob};
// self
use crate::{
	_prelude::*,
	cipher::KeyManagement,
	config::BrokerConfig,
	error::{UpstreamError, UpstreamFuture},
};

const SERVICE: &str = "kms";

/// Envelope encryption backed by AWS KMS.
#[derive(Clone, Debug)]
pub struct KmsKeyManagement {
	client: Client,
}
impl KmsKeyManagement {
	/// Wraps an already configured client.
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	/// Connects with the AWS configuration derived from `config`.
	pub async fn connect(config: &BrokerConfig) -> Self {
		Self::new(Client::new(&config.aws_sdk_config().await))
	}
}
impl KeyManagement for KmsKeyManagement {
	fn encrypt<'a>(&'a self, key_id: &'a str, plaintext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>> {
		Box::pin(async move {
			let output = self
				.client
				.encrypt()
				.key_id(key_id)
				.plaintext(Blob::new(plaintext))
				.send()
				.await
				.map_err(|e| UpstreamError::new(SERVICE, DisplayErrorContext(e).to_string()))?;

			output
				.ciphertext_blob()
				.map(|blob| blob.as_ref().to_vec())
				.ok_or_else(|| UpstreamError::new(SERVICE, "Encrypt response carried no ciphertext"))
		})
	}

	fn decrypt<'a>(&'a self, ciphertext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>> {
		Box::pin(async move {
			let output = self
				.client
				.decrypt()
				.ciphertext_blob(Blob::new(ciphertext))
				.send()
				.await
				.map_err(|e| UpstreamError::new(SERVICE, DisplayErrorContext(e).to_string()))?;

			output
				.plaintext()
				.map(|blob| blob.as_ref().to_vec())
				.ok_or_else(|| UpstreamError::new(SERVICE, "Decrypt response carried no plaintext"))
		})
	}
}
