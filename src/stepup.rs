//! Second-factor (step-up) verification against a three-call provider protocol.
//!
//! The provider is probed for health, asked whether the user must authenticate, and finally
//! asked to verify the chosen factor. Each call happens once; nothing is retried or cached.

// self
use crate::{
	_prelude::*,
	error::{UpstreamError, UpstreamFuture},
	model::SecretString,
};

/// Second-factor provider contract (health / pre-auth / auth).
pub trait StepUpClient
where
	Self: Send + Sync,
{
	/// Health probe.
	fn check(&self) -> UpstreamFuture<'_, ProviderStatus>;

	/// Asks whether `username` must present a second factor.
	fn preauth<'a>(&'a self, username: &'a str) -> UpstreamFuture<'a, PreauthResponse>;

	/// Verifies the requested factor.
	fn auth<'a>(&'a self, request: &'a AuthRequest) -> UpstreamFuture<'a, AuthResponse>;
}

/// Envelope status attached to every provider response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
	/// `OK` on success, anything else on failure.
	pub stat: String,
	/// Failure message, if any.
	#[serde(default)]
	pub message: Option<String>,
	/// Failure detail, if any.
	#[serde(default)]
	pub message_detail: Option<String>,
}
impl ProviderStatus {
	/// Successful status.
	pub fn ok() -> Self {
		Self { stat: "OK".into(), message: None, message_detail: None }
	}

	/// Failed status carrying a message.
	pub fn fail(message: impl Into<String>) -> Self {
		Self { stat: "FAIL".into(), message: Some(message.into()), message_detail: None }
	}

	/// Returns `true` when the provider reported `OK`.
	pub fn is_ok(&self) -> bool {
		self.stat == "OK"
	}

	fn describe(&self) -> String {
		match (&self.message, &self.message_detail) {
			(Some(message), Some(detail)) => format!("{message} ({detail})"),
			(Some(message), None) => message.clone(),
			(None, _) => format!("provider returned stat `{}`", self.stat),
		}
	}
}

/// Pre-authentication answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreauthResponse {
	/// Envelope status.
	pub status: ProviderStatus,
	/// `allow`, `auth`, `deny`, `enroll`, or anything else.
	pub result: String,
	/// Human-readable status message.
	#[serde(default)]
	pub status_msg: String,
	/// Enrollment portal, present for `enroll`.
	#[serde(default)]
	pub enroll_portal_url: Option<String>,
}

/// Authentication answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
	/// Envelope status.
	pub status: ProviderStatus,
	/// Must be `allow` for the factor to count as verified.
	pub result: String,
	/// Human-readable status message.
	#[serde(default)]
	pub status_msg: String,
}

/// Factor chosen by the caller's `second_factor` input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Factor {
	/// Provider picks the default method on the default device.
	Auto,
	/// Push notification to the default device.
	Push,
	/// Phone call to the default device.
	Phone,
	/// SMS passcodes to the default device.
	Sms,
	/// Manually entered passcode.
	Passcode(SecretString),
}
impl Factor {
	/// Device used for non-passcode factors.
	pub const DEFAULT_DEVICE: &'static str = "auto";

	/// Interprets raw input: empty means `auto`, known keywords select a method, and any other
	/// value is a passcode.
	pub fn parse(input: &str) -> Self {
		match input.trim() {
			"" | "auto" => Factor::Auto,
			"push" => Factor::Push,
			"phone" => Factor::Phone,
			"sms" => Factor::Sms,
			passcode => Factor::Passcode(SecretString::new(passcode)),
		}
	}

	/// Provider factor label.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Factor::Auto => "auto",
			Factor::Push => "push",
			Factor::Phone => "phone",
			Factor::Sms => "sms",
			Factor::Passcode(_) => "passcode",
		}
	}

	/// Device selector, absent for passcodes.
	pub fn device(&self) -> Option<&'static str> {
		match self {
			Factor::Passcode(_) => None,
			_ => Some(Self::DEFAULT_DEVICE),
		}
	}

	/// Passcode, for [`Factor::Passcode`] only.
	pub fn passcode(&self) -> Option<&SecretString> {
		match self {
			Factor::Passcode(code) => Some(code),
			_ => None,
		}
	}
}

/// Authentication call issued after a successful pre-auth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRequest {
	/// User being verified.
	pub username: String,
	/// Chosen factor.
	pub factor: Factor,
}

/// Enforces step-up authentication through a [`StepUpClient`].
#[derive(Clone)]
pub struct StepUpGate {
	client: Arc<dyn StepUpClient>,
}
impl StepUpGate {
	/// Wraps a provider client.
	pub fn new(client: Arc<dyn StepUpClient>) -> Self {
		Self { client }
	}

	/// Runs health probe, pre-auth, and auth for `username`, succeeding only on `allow`.
	pub async fn validate_second_factor(&self, username: &str, factor_input: &str) -> Result<()> {
		let health = self.client.check().await.map_err(unavailable)?;

		if !health.is_ok() {
			return Err(Error::StepUpProviderUnavailable {
				message: format!("health check failed: {}", health.describe()),
			});
		}

		let preauth = self.client.preauth(username).await.map_err(unavailable)?;

		if !preauth.status.is_ok() {
			return Err(Error::StepUpProviderUnavailable {
				message: format!("pre-auth failed: {}", preauth.status.describe()),
			});
		}

		match preauth.result.as_str() {
			"auth" => {},
			"allow" => {
				return Err(Error::StepUpDenied {
					message: "bypassing the second factor is not permitted".into(),
				});
			},
			"deny" => return Err(Error::StepUpDenied { message: preauth.status_msg }),
			"enroll" =>
				return Err(Error::StepUpEnrollmentRequired {
					message: preauth.status_msg,
					enroll_url: preauth.enroll_portal_url.unwrap_or_default(),
				}),
			other =>
				return Err(Error::StepUpProviderUnavailable {
					message: format!("unexpected pre-auth result `{other}`"),
				}),
		}

		let request = AuthRequest { username: username.to_owned(), factor: Factor::parse(factor_input) };
		let response = self.client.auth(&request).await.map_err(unavailable)?;

		if !response.status.is_ok() {
			return Err(Error::StepUpDenied {
				message: format!("could not authenticate user: {}", response.status.describe()),
			});
		}
		if response.result != "allow" {
			return Err(Error::StepUpDenied { message: response.status_msg });
		}

		Ok(())
	}
}
impl Debug for StepUpGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("StepUpGate(..)")
	}
}

fn unavailable(e: UpstreamError) -> Error {
	Error::StepUpProviderUnavailable { message: e.to_string().trim_end_matches('.').to_owned() }
}
