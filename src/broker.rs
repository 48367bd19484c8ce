//! The orchestrator: authorize, step up, mint, encode.
//!
//! [`Broker`] is the only component that turns an [`Error`] into user-facing text; every other
//! layer returns typed errors unchanged.

// self
use crate::{
	_prelude::*,
	authz::AuthorizationResolver,
	cipher::SecretCipher,
	config::BrokerConfig,
	error::{ConfigError, ErrorKind},
	mint::{CredentialMinter, SessionDuration, TokenService},
	model::{DetailedAssociation, DetailedTarget, Identity, SecretString, TargetId},
	obs::{self, BrokerStage},
	output::{OutputEncoder, OutputFormat, SigninExchange},
	stepup::{StepUpClient, StepUpGate},
	store::Store,
};

pub use crate::output::BrokerOutput;

/// Validated `become` request parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BecomeRequest {
	/// Target to become.
	pub target_id: TargetId,
	/// Requested lifetime; `None` uses the provider default.
	pub duration: Option<SessionDuration>,
	/// Requested artifact.
	pub format: OutputFormat,
	/// Raw second-factor input (`""`, a keyword, or a passcode).
	pub second_factor: SecretString,
}
impl BecomeRequest {
	/// Creates a request with the provider-default lifetime and automatic second factor.
	pub fn new(target_id: TargetId, format: OutputFormat) -> Self {
		Self { target_id, duration: None, format, second_factor: SecretString::new("") }
	}

	/// Parses raw web-layer parameters.
	///
	/// `target_id` and `format` must be valid; an unusable `duration` silently falls back to the
	/// provider default.
	pub fn from_params(
		target_id: &str,
		duration: &str,
		format: &str,
		second_factor: &str,
	) -> Result<Self> {
		Ok(Self {
			target_id: TargetId::new(target_id)?,
			duration: SessionDuration::parse(duration),
			format: format.parse()?,
			second_factor: SecretString::new(second_factor),
		})
	}

	/// Sets the requested lifetime.
	pub fn with_duration(mut self, duration: SessionDuration) -> Self {
		self.duration = Some(duration);

		self
	}

	/// Sets the second-factor input.
	pub fn with_second_factor(mut self, input: impl Into<String>) -> Self {
		self.second_factor = SecretString::new(input);

		self
	}
}

/// Sequences authorization, step-up, minting, and encoding for one request.
#[derive(Clone, Debug)]
pub struct Broker {
	config: BrokerConfig,
	store: Store,
	resolver: AuthorizationResolver,
	step_up: Option<StepUpGate>,
	minter: CredentialMinter,
	encoder: OutputEncoder,
}
impl Broker {
	/// Wires the broker from its collaborators.
	pub fn new(
		config: BrokerConfig,
		store: Store,
		cipher: SecretCipher,
		tokens: Arc<dyn TokenService>,
		exchange: Arc<dyn SigninExchange>,
	) -> Self {
		let cipher = match &config.kms_key_id {
			Some(key_id) => cipher.with_default_key(key_id.clone()),
			None => cipher,
		};
		let minter = CredentialMinter::new(cipher, tokens)
			.with_federation_policy(config.federation_policy.clone());
		let encoder = OutputEncoder::new(
			exchange,
			config.federation_endpoint.clone(),
			config.issuer.clone(),
			config.console_destination.clone(),
		);

		Self {
			resolver: AuthorizationResolver::new(store.clone()),
			store,
			step_up: None,
			minter,
			encoder,
			config,
		}
	}

	/// Attaches the second-factor provider used in high-security mode.
	pub fn with_step_up(mut self, client: Arc<dyn StepUpClient>) -> Self {
		self.step_up = Some(StepUpGate::new(client));

		self
	}

	/// Broker configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Entity store.
	pub fn store(&self) -> &Store {
		&self.store
	}

	/// Authorization resolver.
	pub fn resolver(&self) -> &AuthorizationResolver {
		&self.resolver
	}

	/// Targets the identity may become through its groups.
	pub async fn allowed_targets(&self, identity: &Identity) -> Result<Vec<DetailedTarget>> {
		obs::observe(
			BrokerStage::Authorize,
			"allowed_targets",
			self.resolver.allowed_targets(&identity.groups),
		)
		.await
	}

	/// Targets granted to the identity directly.
	pub async fn granted_targets(&self, identity: &Identity) -> Result<Vec<DetailedAssociation>> {
		obs::observe(
			BrokerStage::Authorize,
			"granted_targets",
			self.store.get_associations_for_user(&identity.username),
		)
		.await
	}

	/// Mints credentials for `request.target_id` and encodes them as requested.
	///
	/// Any failing stage aborts the whole request; nothing partial is returned.
	pub async fn become_target(
		&self,
		identity: &Identity,
		request: &BecomeRequest,
	) -> Result<BrokerOutput> {
		obs::observe(BrokerStage::Become, "become_target", self.run_become(identity, request)).await
	}

	async fn run_become(&self, identity: &Identity, request: &BecomeRequest) -> Result<BrokerOutput> {
		let target = obs::observe(
			BrokerStage::Authorize,
			"authorize",
			self.resolver.authorize(identity, &request.target_id),
		)
		.await?;

		if self.config.high_security {
			let gate = self.step_up.as_ref().ok_or(ConfigError::MissingStepUpGate)?;

			obs::observe(
				BrokerStage::StepUp,
				"validate_second_factor",
				gate.validate_second_factor(&identity.username, request.second_factor.expose()),
			)
			.await?;
		}

		let bundle = obs::observe(
			BrokerStage::Mint,
			"mint",
			self.minter.mint(&target, &identity.username, request.duration),
		)
		.await?;

		obs::observe(BrokerStage::Encode, "encode", self.encoder.encode(request.format, &bundle)).await
	}

	/// Renders a failure for the person who made the request.
	///
	/// Internal detail (store keys, upstream messages) is withheld; provider messages the user
	/// can act on are passed through.
	pub fn describe_failure(error: &Error) -> String {
		match error {
			Error::InvalidRequest { reason } => format!("The request is invalid: {reason}."),
			Error::StepUpDenied { message } if !message.is_empty() =>
				format!("Second factor verification failed: {message}"),
			Error::StepUpEnrollmentRequired { message, enroll_url } =>
				format!("Enroll a second factor before continuing: {message} ({enroll_url})"),
			other => match other.kind() {
				ErrorKind::Unauthorized => "You are not allowed to access this target.".into(),
				ErrorKind::NotFound => "The requested record does not exist.".into(),
				ErrorKind::AlreadyExists => "The record already exists.".into(),
				ErrorKind::InvalidTargetType => "This target is misconfigured.".into(),
				ErrorKind::MalformedSecret | ErrorKind::DecryptionFailed =>
					"The stored credentials for this target could not be used.".into(),
				ErrorKind::StepUpDenied | ErrorKind::StepUpEnrollmentRequired =>
					"Second factor verification failed.".into(),
				ErrorKind::StepUpProviderUnavailable =>
					"The second factor provider is unavailable. Try again later.".into(),
				ErrorKind::SigninExchangeFailed => "The AWS console sign-in failed.".into(),
				ErrorKind::UpstreamUnavailable =>
					"AWS is unavailable right now. Try again later.".into(),
				ErrorKind::InvalidRequest => "The request is invalid.".into(),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::StoreError;

	#[test]
	fn params_parse_with_default_duration() {
		let request = BecomeRequest::from_params("t1", "", "credentials", "")
			.expect("Minimal parameters should parse.");

		assert_eq!(request.target_id.as_ref(), "t1");
		assert_eq!(request.duration, None);
		assert_eq!(request.format, OutputFormat::Credentials);

		let request = BecomeRequest::from_params("t1", "900", "console", "123456")
			.expect("Full parameters should parse.");

		assert_eq!(request.duration, SessionDuration::from_secs(900));
		assert_eq!(request.second_factor.expose(), "123456");
	}

	#[test]
	fn params_reject_bad_target_or_format() {
		assert!(matches!(
			BecomeRequest::from_params("", "", "console", ""),
			Err(Error::InvalidRequest { .. })
		));
		assert!(matches!(
			BecomeRequest::from_params("t1", "", "zip", ""),
			Err(Error::InvalidRequest { .. })
		));
	}

	#[test]
	fn failure_text_hides_internal_detail() {
		let storage: Error = StoreError::Backend { message: "arn:aws:dynamodb:secret-table".into() }.into();
		let text = Broker::describe_failure(&storage);

		assert!(!text.contains("dynamodb"));

		let enroll = Error::StepUpEnrollmentRequired {
			message: "Enroll now".into(),
			enroll_url: "https://enroll.example.com".into(),
		};

		assert!(Broker::describe_failure(&enroll).contains("https://enroll.example.com"));
		assert_eq!(
			Broker::describe_failure(&Error::Unauthorized { username: "alice".into(), target: "t1".into() }),
			"You are not allowed to access this target."
		);
	}
}
