//! Broker configuration, its builder, and validation.

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	mint::DEFAULT_FEDERATION_POLICY,
	output::{DEFAULT_CONSOLE_DESTINATION, DEFAULT_FEDERATION_ENDPOINT},
};

/// Validated broker settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Issuer embedded in console redirects.
	pub issuer: Url,
	/// Console page the redirect lands on.
	pub console_destination: Url,
	/// Federation endpoint for the token exchange and the login redirect.
	pub federation_endpoint: Url,
	/// Requires a second factor before minting.
	pub high_security: bool,
	/// Default key for encrypting federation secrets.
	pub kms_key_id: Option<String>,
	/// Policy attached to federation tokens.
	pub federation_policy: String,
	/// Region for AWS clients and the federation credential scope.
	pub region: Option<String>,
}
impl BrokerConfig {
	/// Creates a builder seeded with the required issuer.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::default()
	}

	/// Decodes and validates a JSON configuration document.
	pub fn from_json(document: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(document);
		let builder: BrokerConfigBuilder = serde_path_to_error::deserialize(&mut de).map_err(|e| {
			ConfigError::InvalidDocument { path: e.path().to_string(), message: e.inner().to_string() }
		})?;

		builder.build()
	}

	/// Re-checks every invariant.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_endpoint("issuer", &self.issuer)?;
		validate_endpoint("console destination", &self.console_destination)?;
		validate_endpoint("federation", &self.federation_endpoint)?;
		validate_policy(&self.federation_policy)?;

		if self.kms_key_id.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::InvalidDocument {
				path: "kms_key_id".into(),
				message: "key id cannot be empty".into(),
			});
		}
		if self.region.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::InvalidDocument {
				path: "region".into(),
				message: "region cannot be empty".into(),
			});
		}

		Ok(())
	}

	/// Loads the default AWS configuration chain, pinned to [`BrokerConfig::region`] when set.
	///
	/// Every AWS adapter connects through this, so one setting governs all clients.
	#[cfg(feature = "aws")]
	pub async fn aws_sdk_config(&self) -> aws_config::SdkConfig {
		let loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
		let loader = match &self.region {
			Some(region) => loader.region(aws_config::Region::new(region.clone())),
			None => loader,
		};

		loader.load().await
	}
}

/// Builder for [`BrokerConfig`] values; also the serde shape of configuration documents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfigBuilder {
	/// Issuer embedded in console redirects (required).
	pub issuer: Option<Url>,
	/// Console landing page; defaults to the AWS console.
	pub console_destination: Option<Url>,
	/// Federation endpoint; defaults to the AWS sign-in federation endpoint.
	pub federation_endpoint: Option<Url>,
	/// Step-up requirement; defaults to `true`.
	pub high_security: Option<bool>,
	/// Default encryption key.
	pub kms_key_id: Option<String>,
	/// Federation policy; defaults to the allow-all document.
	pub federation_policy: Option<String>,
	/// AWS region.
	pub region: Option<String>,
}
impl BrokerConfigBuilder {
	/// Sets the issuer.
	pub fn issuer(mut self, url: Url) -> Self {
		self.issuer = Some(url);

		self
	}

	/// Sets the console destination.
	pub fn console_destination(mut self, url: Url) -> Self {
		self.console_destination = Some(url);

		self
	}

	/// Sets the federation endpoint.
	pub fn federation_endpoint(mut self, url: Url) -> Self {
		self.federation_endpoint = Some(url);

		self
	}

	/// Enables or disables the step-up requirement.
	pub fn high_security(mut self, enabled: bool) -> Self {
		self.high_security = Some(enabled);

		self
	}

	/// Sets the default encryption key.
	pub fn kms_key_id(mut self, key_id: impl Into<String>) -> Self {
		self.kms_key_id = Some(key_id.into());

		self
	}

	/// Overrides the federation policy.
	pub fn federation_policy(mut self, policy: impl Into<String>) -> Self {
		self.federation_policy = Some(policy.into());

		self
	}

	/// Sets the AWS region.
	pub fn region(mut self, region: impl Into<String>) -> Self {
		self.region = Some(region.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigError> {
		let issuer = self.issuer.ok_or(ConfigError::MissingIssuer)?;
		let console_destination = match self.console_destination {
			Some(url) => url,
			None => parse_default("console destination", DEFAULT_CONSOLE_DESTINATION)?,
		};
		let federation_endpoint = match self.federation_endpoint {
			Some(url) => url,
			None => parse_default("federation", DEFAULT_FEDERATION_ENDPOINT)?,
		};
		let config = BrokerConfig {
			issuer,
			console_destination,
			federation_endpoint,
			high_security: self.high_security.unwrap_or(true),
			kms_key_id: self.kms_key_id,
			federation_policy: self
				.federation_policy
				.unwrap_or_else(|| DEFAULT_FEDERATION_POLICY.to_owned()),
			region: self.region,
		};

		config.validate()?;

		Ok(config)
	}
}

fn parse_default(endpoint: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|e| ConfigError::InvalidUrl { endpoint, message: e.to_string() })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

fn validate_policy(policy: &str) -> Result<(), ConfigError> {
	match serde_json::from_str::<serde_json::Value>(policy) {
		Ok(serde_json::Value::Object(_)) => Ok(()),
		Ok(other) => Err(ConfigError::InvalidPolicy { reason: format!("found {other}") }),
		Err(e) => Err(ConfigError::InvalidPolicy { reason: e.to_string() }),
	}
}
