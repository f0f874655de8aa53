//! Bounded raw/modified history read.
//!
//! A bad overall status fails the whole action. Otherwise every returned
//! point becomes one record, in server order, and the last point processed
//! is kept as the action's last value.

use tracing::{debug, info};

use super::{ActionError, Cycle, ReadState};
use crate::record::{RecordSink, ResultRecord};
use crate::session::{ReadRawModifiedDetails, Session};

#[derive(Debug, Clone)]
pub struct HistoryReadState {
    pub read: ReadState,
    pub details: ReadRawModifiedDetails,
}

impl HistoryReadState {
    pub fn new(details: ReadRawModifiedDetails) -> Self {
        Self {
            read: ReadState::default(),
            details,
        }
    }
}

pub(super) async fn execute(
    state: &mut HistoryReadState,
    cycle: &Cycle<'_>,
    session: &dyn Session,
    sink: Option<&dyn RecordSink>,
) -> Result<(), ActionError> {
    let details = &state.details;
    debug!("About to perform a HistoryRead:");
    debug!("  Start time:  {}", details.start_time);
    debug!("  End time:  {}", details.end_time);
    debug!("  Read modified:  {}", details.is_read_modified);
    debug!("  Values per node:  {}", details.num_values_per_node);
    debug!("  Return bounds:  {}", details.return_bounds);
    debug!("  Node to read:  {}", cycle.node);

    let result = session.read_history(cycle.node, details).await?;
    debug!(status = %result.status, values = result.values.len(), "HistoryRead returned");

    if result.status.is_bad() {
        info!("Bad result ({}) reading {}", result.status, cycle.tag);
        return Err(ActionError::HistoryStatus {
            status: result.status,
        });
    }
    if result.status.is_uncertain() {
        info!(action = cycle.description, "Uncertain result: {} values", result.values.len());
    }

    for dv in result.values {
        debug!("  {} ({:?})", dv, dv.source_timestamp);
        if let Some(sink) = sink {
            sink.write(&ResultRecord::from_data_value(cycle.tag, &dv))?;
        }
        state.read.last_value = Some(dv);
    }
    Ok(())
}
