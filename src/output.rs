//! Encodes minted credentials as a credentials file or a console sign-in redirect.

// self
use crate::{
	_prelude::*,
	error::UpstreamFuture,
	mint::CredentialBundle,
};

/// Default federation endpoint used for both the token exchange and the login redirect.
pub const DEFAULT_FEDERATION_ENDPOINT: &str = "https://signin.aws.amazon.com/federation";
/// Default console landing page.
pub const DEFAULT_CONSOLE_DESTINATION: &str = "https://console.aws.amazon.com/";

/// Requested output artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
	/// Console single-sign-on redirect.
	Console,
	/// Downloadable credentials file.
	Credentials,
}
impl OutputFormat {
	/// Returns the request-parameter label.
	pub const fn as_str(self) -> &'static str {
		match self {
			OutputFormat::Console => "console",
			OutputFormat::Credentials => "credentials",
		}
	}
}
impl Display for OutputFormat {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for OutputFormat {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"console" => Ok(Self::Console),
			"credentials" => Ok(Self::Credentials),
			other => Err(Error::invalid_request(format!(
				"format must be `console` or `credentials`, got `{other}`"
			))),
		}
	}
}

/// Produced artifact.
#[derive(Clone, PartialEq, Eq)]
pub enum BrokerOutput {
	/// Plaintext credentials file.
	File(String),
	/// HTTPS console redirect carrying a one-time sign-in token.
	Redirect(Url),
}
impl Debug for BrokerOutput {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			BrokerOutput::File(_) => f.write_str("File(<redacted>)"),
			BrokerOutput::Redirect(_) => f.write_str("Redirect(<redacted>)"),
		}
	}
}

/// Session descriptor exchanged for a console sign-in token.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleSession {
	/// Access key ID.
	#[serde(rename = "sessionId")]
	pub session_id: String,
	/// Secret access key.
	#[serde(rename = "sessionKey")]
	pub session_key: String,
	/// Session token.
	#[serde(rename = "sessionToken")]
	pub session_token: String,
}
impl ConsoleSession {
	/// Builds the descriptor from a credential bundle.
	pub fn from_bundle(bundle: &CredentialBundle) -> Self {
		Self {
			session_id: bundle.access_key_id.clone(),
			session_key: bundle.secret_access_key.expose().to_owned(),
			session_token: bundle.session_token.expose().to_owned(),
		}
	}

	/// JSON form posted to the federation endpoint.
	pub fn to_json(&self) -> Result<String> {
		serde_json::to_string(self)
			.map_err(|e| Error::SigninExchangeFailed { message: format!("session encoding: {e}") })
	}
}
impl Debug for ConsoleSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ConsoleSession").field("session_id", &self.session_id).finish_non_exhaustive()
	}
}

/// Console sign-in token exchange contract.
pub trait SigninExchange
where
	Self: Send + Sync,
{
	/// Exchanges the session descriptor for a one-time sign-in token.
	fn signin_token<'a>(&'a self, session: &'a ConsoleSession) -> UpstreamFuture<'a, String>;
}

/// Turns credential bundles into output artifacts.
#[derive(Clone)]
pub struct OutputEncoder {
	exchange: Arc<dyn SigninExchange>,
	federation_endpoint: Url,
	issuer: Url,
	destination: Url,
}
impl OutputEncoder {
	/// Creates an encoder issuing redirects for `issuer` through `federation_endpoint`.
	pub fn new(
		exchange: Arc<dyn SigninExchange>,
		federation_endpoint: Url,
		issuer: Url,
		destination: Url,
	) -> Self {
		Self { exchange, federation_endpoint, issuer, destination }
	}

	/// Renders the credentials file.
	pub fn encode_as_file(&self, bundle: &CredentialBundle) -> String {
		encode_as_file(bundle)
	}

	/// Exchanges the bundle for a sign-in token and composes the console redirect.
	pub async fn encode_as_console_url(&self, bundle: &CredentialBundle) -> Result<Url> {
		let session = ConsoleSession::from_bundle(bundle);
		let token = self
			.exchange
			.signin_token(&session)
			.await
			.map_err(|e| Error::SigninExchangeFailed { message: e.message })?;

		if token.is_empty() {
			return Err(Error::SigninExchangeFailed {
				message: "endpoint returned an empty sign-in token".into(),
			});
		}

		let mut url = self.federation_endpoint.clone();

		url.set_query(None);
		url.query_pairs_mut()
			.append_pair("Action", "login")
			.append_pair("Issuer", self.issuer.as_str())
			.append_pair("Destination", self.destination.as_str())
			.append_pair("SigninToken", &token);

		Ok(url)
	}

	/// Encodes the bundle in the requested format.
	pub async fn encode(&self, format: OutputFormat, bundle: &CredentialBundle) -> Result<BrokerOutput> {
		match format {
			OutputFormat::Credentials => Ok(BrokerOutput::File(self.encode_as_file(bundle))),
			OutputFormat::Console => Ok(BrokerOutput::Redirect(self.encode_as_console_url(bundle).await?)),
		}
	}
}
impl Debug for OutputEncoder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OutputEncoder")
			.field("federation_endpoint", &self.federation_endpoint.as_str())
			.field("issuer", &self.issuer.as_str())
			.field("destination", &self.destination.as_str())
			.finish_non_exhaustive()
	}
}

/// Renders the `[default]` profile with the four credential keys.
///
/// `aws_security_token` repeats the session token for older SDKs.
pub fn encode_as_file(bundle: &CredentialBundle) -> String {
	format!(
		"[default]\naws_access_key_id = {}\naws_secret_access_key = {}\naws_session_token = {}\naws_security_token = {}\n",
		bundle.access_key_id,
		bundle.secret_access_key.expose(),
		bundle.session_token.expose(),
		bundle.session_token.expose(),
	)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::model::SecretString;

	fn bundle() -> CredentialBundle {
		CredentialBundle {
			access_key_id: "ASIAEXAMPLE".into(),
			secret_access_key: SecretString::new("secret"),
			session_token: SecretString::new("token"),
			expiration: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn file_has_profile_and_four_keys() {
		let file = encode_as_file(&bundle());
		let lines = file.lines().collect::<Vec<_>>();

		assert_eq!(lines[0], "[default]");
		assert_eq!(lines[1..], [
			"aws_access_key_id = ASIAEXAMPLE",
			"aws_secret_access_key = secret",
			"aws_session_token = token",
			"aws_security_token = token",
		]);
	}

	#[test]
	fn console_session_uses_federation_field_names() {
		let json = ConsoleSession::from_bundle(&bundle()).to_json().expect("Session should encode.");
		let value: serde_json::Value = serde_json::from_str(&json).expect("Session JSON should parse.");

		assert_eq!(value["sessionId"], "ASIAEXAMPLE");
		assert_eq!(value["sessionKey"], "secret");
		assert_eq!(value["sessionToken"], "token");
	}

	#[test]
	fn format_parsing() {
		assert_eq!("console".parse::<OutputFormat>().expect("console should parse."), OutputFormat::Console);
		assert!(matches!("html".parse::<OutputFormat>(), Err(Error::InvalidRequest { .. })));
	}
}
