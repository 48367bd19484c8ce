//! Reqwest transport for the console sign-in token exchange.
//!
//! [`ReqwestSigninExchange`] posts the JSON session descriptor to the federation endpoint and
//! reads the `SigninToken` field of the reply. Redirects are not followed and nothing is retried;
//! a single failed round-trip aborts the request.

// std
use std::ops::Deref;
// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, UpstreamError, UpstreamFuture},
	output::{ConsoleSession, SigninExchange},
};

const SERVICE: &str = "signin";

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that never follows redirects.
	pub fn no_redirects() -> Result<Self, ConfigError> {
		Self::no_redirects_from(ReqwestClient::builder())
	}

	/// Finishes `builder` with redirects disabled; any redirect policy already set is replaced.
	pub fn no_redirects_from(builder: ReqwestClientBuilder) -> Result<Self, ConfigError> {
		Ok(Self(builder.redirect(Policy::none()).build()?))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

#[derive(Deserialize)]
struct SigninTokenResponse {
	#[serde(rename = "SigninToken")]
	signin_token: String,
}

/// [`SigninExchange`] over HTTPS.
#[derive(Clone, Debug)]
pub struct ReqwestSigninExchange {
	client: ReqwestHttpClient,
	endpoint: Url,
}
impl ReqwestSigninExchange {
	/// Creates an exchange posting to `endpoint` over a default client.
	pub fn new(endpoint: Url) -> Result<Self, ConfigError> {
		Ok(Self { client: ReqwestHttpClient::no_redirects()?, endpoint })
	}

	/// Creates an exchange whose client is built from `builder` with redirects disabled.
	pub fn with_builder(builder: ReqwestClientBuilder, endpoint: Url) -> Result<Self, ConfigError> {
		Ok(Self { client: ReqwestHttpClient::no_redirects_from(builder)?, endpoint })
	}

	/// Federation endpoint receiving the exchange.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl SigninExchange for ReqwestSigninExchange {
	fn signin_token<'a>(&'a self, session: &'a ConsoleSession) -> UpstreamFuture<'a, String> {
		Box::pin(async move {
			let session = serde_json::to_string(session)
				.map_err(|e| UpstreamError::with_source(SERVICE, e))?;
			let response = self
				.client
				.post(self.endpoint.clone())
				.form(&[("Action", "getSigninToken"), ("Session", session.as_str())])
				.send()
				.await
				.map_err(|e| UpstreamError::with_source(SERVICE, e))?;
			let status = response.status();

			// Redirects are never followed, so a 3xx lands here too.
			if !status.is_success() {
				return Err(UpstreamError::new(
					SERVICE,
					format!("federation endpoint returned HTTP {}", status.as_u16()),
				));
			}

			let body = response.bytes().await.map_err(|e| UpstreamError::with_source(SERVICE, e))?;
			let mut de = serde_json::Deserializer::from_slice(&body);
			let parsed: SigninTokenResponse = serde_path_to_error::deserialize(&mut de)
				.map_err(|e| {
					UpstreamError::new(
						SERVICE,
						format!("unexpected response at `{}`: {}", e.path(), e.inner()),
					)
				})?;

			Ok(parsed.signin_token)
		})
	}
}
