//! Optional observability helpers for broker stages.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `aws_access_broker.stage` with the `stage`
//!   and `call_site` fields, plus a warning event for every cascade child that could not be
//!   removed.
//! - Enable `metrics` to increment the `aws_access_broker_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`, and
//!   `aws_access_broker_cascade_skipped_total` labeled by `table`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BrokerStage {
	/// Group-based authorization lookup.
	Authorize,
	/// Second-factor verification.
	StepUp,
	/// Credential issuance.
	Mint,
	/// File or console-URL encoding.
	Encode,
	/// Whole become request, end to end.
	Become,
}
impl BrokerStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			BrokerStage::Authorize => "authorize",
			BrokerStage::StepUp => "step_up",
			BrokerStage::Mint => "mint",
			BrokerStage::Encode => "encode",
			BrokerStage::Become => "become",
		}
	}
}
impl Display for BrokerStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a broker stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a stage span and records attempt plus success/failure.
pub(crate) async fn observe<T, Fut>(stage: BrokerStage, call_site: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = StageSpan::new(stage, call_site);

	record_stage_outcome(stage, StageOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_stage_outcome(stage, StageOutcome::Success),
		Err(_) => record_stage_outcome(stage, StageOutcome::Failure),
	}

	result
}
