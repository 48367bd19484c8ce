// self
use crate::{
	_prelude::*,
	error::StoreError,
	obs::BrokerStage,
	store::{ItemKey, Table},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by broker stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage + call site.
	pub fn new(stage: BrokerStage, call_site: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("aws_access_broker.stage", stage = stage.as_str(), call_site);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, call_site);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs an applied store mutation. Only keys are logged, never record contents.
pub fn log_mutation(table: Table, action: &'static str, key: &ItemKey) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(table = table.name(), action, key = %key, "store mutation applied");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (table, action, key);
	}
}

/// Reports a cascade child record that could not be removed; the parent delete still succeeds.
pub fn warn_cascade_skipped(table: Table, key: &ItemKey, error: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			table = table.name(),
			key = %key,
			error = %error,
			"cascade delete skipped a child record"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (key, error);
	}

	crate::obs::record_cascade_skipped(table);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn cascade_warning_is_safe_without_subscriber() {
		warn_cascade_skipped(
			Table::UserAssociations,
			&ItemKey::composite("alice", "t1"),
			&StoreError::Backend { message: "throttled".into() },
		);
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = StageSpan::new(BrokerStage::Mint, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
