//! Short-lived AWS credentials for SSO operators: group-based target resolution, step-up
//! verification, envelope-encrypted federation secrets, and CAS-safe entity stores in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod authz;
pub mod broker;
pub mod cipher;
pub mod config;
pub mod error;
#[cfg(feature = "reqwest")] pub mod http;
pub mod mint;
pub mod model;
pub mod obs;
pub mod output;
pub mod stepup;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and collaborator doubles for integration tests; enabled via
	//! `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		broker::Broker,
		cipher::{FederatedKeys, KeyManagement, SecretCipher},
		config::BrokerConfig,
		error::{UpstreamError, UpstreamFuture},
		http::ReqwestSigninExchange,
		mint::{AssumeRoleRequest, CredentialBundle, FederationTokenRequest, TokenService},
		model::SecretString,
		output::{ConsoleSession, SigninExchange},
		stepup::{AuthRequest, AuthResponse, PreauthResponse, ProviderStatus, StepUpClient},
		store::{MemoryStore, Store},
	};

	const SEALED_PREFIX: &str = "sealed:";

	/// Reqwest client builder that accepts the self-signed certificates produced by `httpmock`
	/// during tests.
	pub fn test_reqwest_client_builder() -> ReqwestClientBuilder {
		ReqwestClient::builder().danger_accept_invalid_certs(true).danger_accept_invalid_hostnames(true)
	}

	/// Sign-in exchange posting to `endpoint` through [`test_reqwest_client_builder`].
	pub fn test_signin_exchange(endpoint: Url) -> ReqwestSigninExchange {
		ReqwestSigninExchange::with_builder(test_reqwest_client_builder(), endpoint)
			.expect("Failed to build insecure sign-in exchange for tests.")
	}

	/// Reversible stand-in for a key-management service.
	///
	/// Ciphertext is `sealed:<key-id>:<plaintext>`; anything else fails to decrypt.
	#[derive(Debug, Default)]
	pub struct FakeKms {
		/// When set, every call fails as if the service were unreachable.
		pub unavailable: Mutex<bool>,
	}
	impl KeyManagement for FakeKms {
		fn encrypt<'a>(&'a self, key_id: &'a str, plaintext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>> {
			Box::pin(async move {
				if *self.unavailable.lock() {
					return Err(UpstreamError::new("kms", "service unavailable"));
				}

				let mut sealed = format!("{SEALED_PREFIX}{key_id}:").into_bytes();

				sealed.extend_from_slice(plaintext);

				Ok(sealed)
			})
		}

		fn decrypt<'a>(&'a self, ciphertext: &'a [u8]) -> UpstreamFuture<'a, Vec<u8>> {
			Box::pin(async move {
				if *self.unavailable.lock() {
					return Err(UpstreamError::new("kms", "service unavailable"));
				}

				let rest = ciphertext
					.strip_prefix(SEALED_PREFIX.as_bytes())
					.ok_or_else(|| UpstreamError::new("kms", "InvalidCiphertextException"))?;
				let split = rest
					.iter()
					.position(|b| *b == b':')
					.ok_or_else(|| UpstreamError::new("kms", "InvalidCiphertextException"))?;

				Ok(rest[split + 1..].to_vec())
			})
		}
	}

	/// Issuance double that records every request and answers with [`test_bundle`].
	#[derive(Debug, Default)]
	pub struct ScriptedTokenService {
		/// Role assumptions received.
		pub assumed: Mutex<Vec<AssumeRoleRequest>>,
		/// Federation tokens requested, with the keys that opened the scope.
		pub federated: Mutex<Vec<(FederatedKeys, FederationTokenRequest)>>,
		/// When set, every call fails.
		pub failure: Mutex<Option<String>>,
	}
	impl ScriptedTokenService {
		fn answer(&self) -> Result<CredentialBundle, UpstreamError> {
			match self.failure.lock().clone() {
				Some(message) => Err(UpstreamError::new("sts", message)),
				None => Ok(test_bundle()),
			}
		}
	}
	impl TokenService for ScriptedTokenService {
		fn assume_role<'a>(
			&'a self,
			request: &'a AssumeRoleRequest,
		) -> UpstreamFuture<'a, CredentialBundle> {
			Box::pin(async move {
				self.assumed.lock().push(request.clone());

				self.answer()
			})
		}

		fn federation_token<'a>(
			&'a self,
			keys: &'a FederatedKeys,
			request: &'a FederationTokenRequest,
		) -> UpstreamFuture<'a, CredentialBundle> {
			Box::pin(async move {
				self.federated.lock().push((keys.clone(), request.clone()));

				self.answer()
			})
		}
	}

	/// Step-up provider double with scripted answers for each of the three calls.
	#[derive(Debug)]
	pub struct ScriptedStepUp {
		/// Health probe answer.
		pub check: Mutex<Result<ProviderStatus, String>>,
		/// Pre-auth answer.
		pub preauth: Mutex<Result<PreauthResponse, String>>,
		/// Auth answer.
		pub auth: Mutex<Result<AuthResponse, String>>,
		/// Auth requests received.
		pub auth_requests: Mutex<Vec<AuthRequest>>,
	}
	impl ScriptedStepUp {
		/// Healthy provider that requires and then accepts a second factor.
		pub fn allowing() -> Self {
			Self {
				check: Mutex::new(Ok(ProviderStatus::ok())),
				preauth: Mutex::new(Ok(preauth_result("auth"))),
				auth: Mutex::new(Ok(AuthResponse {
					status: ProviderStatus::ok(),
					result: "allow".into(),
					status_msg: "Success. Logging you in...".into(),
				})),
				auth_requests: Mutex::default(),
			}
		}

		/// Replaces the pre-auth answer.
		pub fn with_preauth(self, response: PreauthResponse) -> Self {
			*self.preauth.lock() = Ok(response);

			self
		}

		/// Replaces the auth answer.
		pub fn with_auth(self, response: AuthResponse) -> Self {
			*self.auth.lock() = Ok(response);

			self
		}

		/// Makes the health probe fail at the transport level.
		pub fn unreachable(self) -> Self {
			*self.check.lock() = Err("connection refused".into());

			self
		}
	}
	impl StepUpClient for ScriptedStepUp {
		fn check(&self) -> UpstreamFuture<'_, ProviderStatus> {
			Box::pin(async move { self.check.lock().clone().map_err(|e| UpstreamError::new("step_up", e)) })
		}

		fn preauth<'a>(&'a self, _username: &'a str) -> UpstreamFuture<'a, PreauthResponse> {
			Box::pin(
				async move { self.preauth.lock().clone().map_err(|e| UpstreamError::new("step_up", e)) },
			)
		}

		fn auth<'a>(&'a self, request: &'a AuthRequest) -> UpstreamFuture<'a, AuthResponse> {
			Box::pin(async move {
				self.auth_requests.lock().push(request.clone());

				self.auth.lock().clone().map_err(|e| UpstreamError::new("step_up", e))
			})
		}
	}

	/// Sign-in exchange double returning a fixed token.
	#[derive(Debug)]
	pub struct ScriptedSignin {
		/// Token to hand out, or a failure message.
		pub answer: Mutex<Result<String, String>>,
		/// Sessions received.
		pub sessions: Mutex<Vec<ConsoleSession>>,
	}
	impl Default for ScriptedSignin {
		fn default() -> Self {
			Self { answer: Mutex::new(Ok("signin-token".into())), sessions: Mutex::default() }
		}
	}
	impl SigninExchange for ScriptedSignin {
		fn signin_token<'a>(&'a self, session: &'a ConsoleSession) -> UpstreamFuture<'a, String> {
			Box::pin(async move {
				self.sessions.lock().push(session.clone());

				self.answer.lock().clone().map_err(|e| UpstreamError::new("signin", e))
			})
		}
	}

	/// Broker wired to in-memory doubles, with handles to every double.
	#[derive(Debug)]
	pub struct TestBroker {
		/// Broker under test.
		pub broker: Broker,
		/// Backing table store.
		pub tables: Arc<MemoryStore>,
		/// Entity store over `tables`.
		pub store: Store,
		/// Key-management double.
		pub kms: Arc<FakeKms>,
		/// Cipher sharing `kms`.
		pub cipher: SecretCipher,
		/// Issuance double.
		pub tokens: Arc<ScriptedTokenService>,
		/// Step-up double.
		pub step_up: Arc<ScriptedStepUp>,
		/// Sign-in exchange double.
		pub signin: Arc<ScriptedSignin>,
	}

	/// Pre-auth answer with the given result and no enrollment URL.
	pub fn preauth_result(result: &str) -> PreauthResponse {
		PreauthResponse {
			status: ProviderStatus::ok(),
			result: result.into(),
			status_msg: format!("preauth {result}"),
			enroll_portal_url: None,
		}
	}

	/// Credentials returned by [`ScriptedTokenService`].
	pub fn test_bundle() -> CredentialBundle {
		CredentialBundle {
			access_key_id: "ASIATESTACCESSKEY".into(),
			secret_access_key: SecretString::new("test-secret-key"),
			session_token: SecretString::new("test-session-token"),
			expiration: OffsetDateTime::UNIX_EPOCH + Duration::hours(1),
		}
	}

	/// Minimal valid configuration.
	pub fn test_config(high_security: bool) -> BrokerConfig {
		BrokerConfig::builder()
			.issuer(Url::parse("https://portal.example.com").expect("Issuer fixture should parse."))
			.high_security(high_security)
			.kms_key_id("alias/test")
			.build()
			.expect("Test configuration should be valid.")
	}

	/// Builds a broker over a [`MemoryStore`] with the given page size and doubles for every
	/// collaborator; the step-up double is attached and accepts by default.
	pub fn build_test_broker(config: BrokerConfig, page_size: usize) -> TestBroker {
		let tables = Arc::new(MemoryStore::with_page_size(page_size));
		let store = Store::new(tables.clone());
		let kms = Arc::new(FakeKms::default());
		let cipher = SecretCipher::new(kms.clone());
		let tokens = Arc::new(ScriptedTokenService::default());
		let step_up = Arc::new(ScriptedStepUp::allowing());
		let signin = Arc::new(ScriptedSignin::default());
		let broker = Broker::new(config, store.clone(), cipher.clone(), tokens.clone(), signin.clone())
			.with_step_up(step_up.clone());

		TestBroker { broker, tables, store, kms, cipher, tokens, step_up, signin }
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{
		Client as ReqwestClient, ClientBuilder as ReqwestClientBuilder, Error as ReqwestError,
	};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
