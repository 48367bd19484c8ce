//! Broker-level error types shared across the store, cipher, step-up, minting, and output layers.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed future returned by outbound collaborator contracts (KMS, STS, step-up, sign-in).
pub type UpstreamFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, UpstreamError>> + 'a + Send>>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure, including conditional-write conflicts.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// An outbound collaborator (STS, KMS, directory) could not serve the request.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Caller input failed validation before any side effect happened.
	#[error("Invalid request: {reason}.")]
	InvalidRequest {
		/// Human-readable reason string.
		reason: String,
	},
	/// Target type is neither `role` nor `user`.
	#[error("Target type `{value}` is invalid.")]
	InvalidTargetType {
		/// Offending type label.
		value: String,
	},
	/// Decrypted federation secret does not have the `access|secret` shape.
	#[error("Federated credentials are malformed.")]
	MalformedSecret,
	/// Ciphertext could not be decoded or the key service refused to decrypt it.
	#[error("Decryption failed: {reason}.")]
	DecryptionFailed {
		/// Decoder- or provider-supplied reason string.
		reason: String,
	},
	/// Identity is not allowed to become the requested target.
	#[error("User `{username}` is not allowed to become target `{target}`.")]
	Unauthorized {
		/// Requesting username.
		username: String,
		/// Requested target identifier.
		target: String,
	},
	/// Second factor was rejected.
	#[error("Second factor was denied: {message}.")]
	StepUpDenied {
		/// Provider-supplied status message.
		message: String,
	},
	/// User must enroll with the second-factor provider first.
	#[error("Second factor enrollment is required: {message} ({enroll_url}).")]
	StepUpEnrollmentRequired {
		/// Provider-supplied status message.
		message: String,
		/// Enrollment portal the user must visit.
		enroll_url: String,
	},
	/// Second-factor provider is unhealthy or answered unexpectedly.
	#[error("Second factor provider is unavailable: {message}.")]
	StepUpProviderUnavailable {
		/// Provider- or broker-supplied message.
		message: String,
	},
	/// Console sign-in token exchange failed.
	#[error("Console sign-in exchange failed: {message}.")]
	SigninExchangeFailed {
		/// Transport- or endpoint-supplied message.
		message: String,
	},
}
impl Error {
	/// Collapses the error onto the broker's stable error taxonomy.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(e) => e.kind(),
			Self::Config(_) | Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
			Self::Upstream(_) => ErrorKind::UpstreamUnavailable,
			Self::InvalidTargetType { .. } => ErrorKind::InvalidTargetType,
			Self::MalformedSecret => ErrorKind::MalformedSecret,
			Self::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
			Self::Unauthorized { .. } => ErrorKind::Unauthorized,
			Self::StepUpDenied { .. } => ErrorKind::StepUpDenied,
			Self::StepUpEnrollmentRequired { .. } => ErrorKind::StepUpEnrollmentRequired,
			Self::StepUpProviderUnavailable { .. } => ErrorKind::StepUpProviderUnavailable,
			Self::SigninExchangeFailed { .. } => ErrorKind::SigninExchangeFailed,
		}
	}

	pub(crate) fn invalid_request(reason: impl Into<String>) -> Self {
		Self::InvalidRequest { reason: reason.into() }
	}
}

/// Stable classification of every broker failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// Entity does not exist (including failed exists-preconditions).
	NotFound,
	/// Entity already exists (failed absent-precondition).
	AlreadyExists,
	/// Target type outside `{role, user}`.
	InvalidTargetType,
	/// Decrypted secret has the wrong shape.
	MalformedSecret,
	/// Ciphertext could not be decrypted.
	DecryptionFailed,
	/// Caller may not access the requested resource.
	Unauthorized,
	/// Second factor rejected.
	StepUpDenied,
	/// Second factor enrollment required.
	StepUpEnrollmentRequired,
	/// Second-factor provider unusable.
	StepUpProviderUnavailable,
	/// Console sign-in token exchange failed.
	SigninExchangeFailed,
	/// Outbound dependency failed.
	UpstreamUnavailable,
	/// Caller input or configuration failed validation.
	InvalidRequest,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::NotFound => "not_found",
			ErrorKind::AlreadyExists => "already_exists",
			ErrorKind::InvalidTargetType => "invalid_target_type",
			ErrorKind::MalformedSecret => "malformed_secret",
			ErrorKind::DecryptionFailed => "decryption_failed",
			ErrorKind::Unauthorized => "unauthorized",
			ErrorKind::StepUpDenied => "step_up_denied",
			ErrorKind::StepUpEnrollmentRequired => "step_up_enrollment_required",
			ErrorKind::StepUpProviderUnavailable => "step_up_provider_unavailable",
			ErrorKind::SigninExchangeFailed => "signin_exchange_failed",
			ErrorKind::UpstreamUnavailable => "upstream_unavailable",
			ErrorKind::InvalidRequest => "invalid_request",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Error type produced by [`TableBackend`](crate::store::TableBackend) implementations and the
/// entity [`Store`](crate::store::Store).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Create-if-absent precondition failed.
	#[error("Record `{key}` already exists in {table}.")]
	AlreadyExists {
		/// Table the write targeted.
		table: String,
		/// Rendered record key.
		key: String,
	},
	/// Exists precondition failed or the record is missing.
	#[error("Record `{key}` does not exist in {table}.")]
	NotFound {
		/// Table the operation targeted.
		table: String,
		/// Rendered record key.
		key: String,
	},
	/// Serialization failures surfaced while (un)marshalling items.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl StoreError {
	/// Maps the store failure onto the broker taxonomy.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
			Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Serialization { .. } | Self::Backend { .. } => ErrorKind::UpstreamUnavailable,
		}
	}

	/// Returns `true` when the error is a failed exists-precondition.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}

	/// Returns `true` when the error is a failed absent-precondition.
	pub fn is_already_exists(&self) -> bool {
		matches!(self, Self::AlreadyExists { .. })
	}
}

/// Configuration and validation failures raised while building a broker.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// Console redirect issuer was not supplied.
	#[error("Missing console issuer URL.")]
	MissingIssuer,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Federation policy is not a JSON object.
	#[error("Federation policy must be a JSON object: {reason}.")]
	InvalidPolicy {
		/// Parser-supplied reason.
		reason: String,
	},
	/// Endpoint URL could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {message}.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser-supplied reason.
		message: String,
	},
	/// Configuration document could not be decoded.
	#[error("Configuration is invalid at `{path}`: {message}.")]
	InvalidDocument {
		/// Path of the offending field.
		path: String,
		/// Decoder-supplied reason.
		message: String,
	},
	/// High-security mode was requested without a step-up client.
	#[error("High-security mode requires a step-up gate.")]
	MissingStepUpGate,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Transport builder failure.
		message: String,
	},
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::HttpClientBuild { message: e.to_string() }
	}
}

/// Failure reported by an outbound collaborator (STS, KMS, step-up, sign-in endpoint).
#[derive(Debug, ThisError)]
#[error("{service} request failed: {message}.")]
pub struct UpstreamError {
	/// Collaborator label (e.g. `sts`, `kms`).
	pub service: &'static str,
	/// Human-readable summary.
	pub message: String,
	/// Transport-specific cause, when available.
	#[source]
	pub source: Option<BoxError>,
}
impl UpstreamError {
	/// Builds an error without an underlying cause.
	pub fn new(service: &'static str, message: impl Into<String>) -> Self {
		Self { service, message: message.into(), source: None }
	}

	/// Wraps a transport-specific error.
	pub fn with_source(
		service: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self { service, message: src.to_string(), source: Some(Box::new(src)) }
	}
}
