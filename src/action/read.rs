//! Single current-value read.

use tracing::{debug, info};

use super::{Action, ActionError, Cycle};
use crate::record::{RecordSink, ResultRecord};
use crate::session::{DataValue, Session};

#[derive(Debug, Clone, Default)]
pub struct ReadState {
    /// Most recent observation, whatever its status. Kept across failed cycles.
    pub last_value: Option<DataValue>,
}

pub(super) async fn execute(
    state: &mut ReadState,
    cycle: &Cycle<'_>,
    session: &dyn Session,
    sink: Option<&dyn RecordSink>,
) -> Result<(), ActionError> {
    let node = session.read_node(cycle.node).await?;
    info!("Node DisplayName is '{}'", node.display_name);
    info!("Node Description is '{}'", node.description);
    debug!(node_id = %node.node_id, browse_name = %node.browse_name, "Node attributes read");

    let value = session.read_value(&node.node_id).await?;
    info!("Node Value is '{}'", value.value);
    debug!(action = cycle.description, data_value = %value, "Value read");

    let value = state.last_value.insert(value);
    if let Some(sink) = sink {
        sink.write(&ResultRecord::from_data_value(cycle.tag, value))?;
    }
    Ok(())
}

pub(super) fn report_success(state: &ReadState, action: &Action) {
    if let Some(dv) = &state.last_value {
        info!("Value ({}): {}", action, dv.value);
    }
}
