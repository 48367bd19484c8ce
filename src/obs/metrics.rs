// self
use crate::{
	obs::{BrokerStage, StageOutcome},
	store::Table,
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: BrokerStage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"aws_access_broker_stage_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Counts cascade children left behind after a parent delete (when enabled).
pub fn record_cascade_skipped(table: Table) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("aws_access_broker_cascade_skipped_total", "table" => table.name())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = table;
	}
}
