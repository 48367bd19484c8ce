//! AWS STS adapter for [`TokenService`] (enabled by the `aws` feature).

// crates.io
use aws_sdk_sts::{Client, config::Credentials, error::DisplayErrorContext, types};
// self
use crate::{
	_prelude::*,
	cipher::FederatedKeys,
	config::BrokerConfig,
	error::{UpstreamError, UpstreamFuture},
	mint::{AssumeRoleRequest, CredentialBundle, FederationTokenRequest, TokenService},
	model::SecretString,
};

const SERVICE: &str = "sts";
/// Region used for the secondary credential scope when none is configured.
pub const DEFAULT_FEDERATION_REGION: &str = "us-east-1";

/// Credential issuance backed by AWS STS.
#[derive(Clone, Debug)]
pub struct StsTokenService {
	client: Client,
	federation_region: String,
}
impl StsTokenService {
	/// Wraps a client configured with the broker's own credentials.
	pub fn new(client: Client) -> Self {
		Self { client, federation_region: DEFAULT_FEDERATION_REGION.into() }
	}

	/// Connects with the AWS configuration derived from `config`.
	///
	/// The configured region also scopes federation tokens; without one they use
	/// [`DEFAULT_FEDERATION_REGION`].
	pub async fn connect(config: &BrokerConfig) -> Self {
		let federation_region =
			config.region.clone().unwrap_or_else(|| DEFAULT_FEDERATION_REGION.into());

		Self { client: Client::new(&config.aws_sdk_config().await), federation_region }
	}

	/// Overrides the region of the secondary credential scope.
	pub fn with_federation_region(mut self, region: impl Into<String>) -> Self {
		self.federation_region = region.into();

		self
	}

	async fn scoped_client(&self, keys: &FederatedKeys) -> Client {
		let credentials = Credentials::new(
			keys.access_key_id.clone(),
			keys.secret_access_key.expose().to_owned(),
			None,
			None,
			"aws-access-broker-federation",
		);
		let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
			.region(aws_config::Region::new(self.federation_region.clone()))
			.credentials_provider(credentials)
			.load()
			.await;

		Client::new(&config)
	}
}
impl TokenService for StsTokenService {
	fn assume_role<'a>(&'a self, request: &'a AssumeRoleRequest) -> UpstreamFuture<'a, CredentialBundle> {
		Box::pin(async move {
			let output = self
				.client
				.assume_role()
				.role_arn(&request.role_arn)
				.role_session_name(&request.session_name)
				.set_external_id(request.external_id.clone())
				.set_duration_seconds(request.duration.map(|d| d.as_secs_i32()))
				.send()
				.await
				.map_err(|e| UpstreamError::new(SERVICE, DisplayErrorContext(e).to_string()))?;

			bundle(output.credentials())
		})
	}

	fn federation_token<'a>(
		&'a self,
		keys: &'a FederatedKeys,
		request: &'a FederationTokenRequest,
	) -> UpstreamFuture<'a, CredentialBundle> {
		Box::pin(async move {
			let output = self
				.scoped_client(keys)
				.await
				.get_federation_token()
				.name(&request.name)
				.policy(&request.policy)
				.set_duration_seconds(request.duration.map(|d| d.as_secs_i32()))
				.send()
				.await
				.map_err(|e| UpstreamError::new(SERVICE, DisplayErrorContext(e).to_string()))?;

			bundle(output.credentials())
		})
	}
}

fn bundle(credentials: Option<&types::Credentials>) -> Result<CredentialBundle, UpstreamError> {
	let credentials =
		credentials.ok_or_else(|| UpstreamError::new(SERVICE, "response carried no credentials"))?;
	let expiration = OffsetDateTime::from_unix_timestamp(credentials.expiration().secs())
		.map_err(|e| UpstreamError::with_source(SERVICE, e))?;

	Ok(CredentialBundle {
		access_key_id: credentials.access_key_id().to_owned(),
		secret_access_key: SecretString::new(credentials.secret_access_key()),
		session_token: SecretString::new(credentials.session_token()),
		expiration,
	})
}
