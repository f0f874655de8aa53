//! Diagnostic read used by the `test` action: the value is shown, never
//! persisted.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Action, ActionError, Cycle};
use crate::session::{Session, Variant};

/// Shown in place of a value the diagnostic slot cannot hold.
pub const UNREPRESENTABLE_VALUE: &str = "Cannot convert type of read value.";

#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot represent a value of type {type_name}")]
pub struct RepresentationError {
    pub type_name: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedValue {
    Typed(Variant),
    Unrepresentable(&'static str),
}

impl ObservedValue {
    /// Scalars and flat arrays of scalars are representable.
    pub fn capture(value: &Variant) -> Result<Self, RepresentationError> {
        let representable = match value {
            Variant::Array(items) => items.iter().all(Variant::is_scalar),
            other => other.is_scalar(),
        };
        if representable {
            Ok(ObservedValue::Typed(value.clone()))
        } else {
            Err(RepresentationError {
                type_name: value.type_name(),
            })
        }
    }
}

impl fmt::Display for ObservedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedValue::Typed(v) => write!(f, "{}", v),
            ObservedValue::Unrepresentable(sentinel) => f.write_str(sentinel),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestState {
    pub observed: Option<ObservedValue>,
}

pub(super) async fn execute(
    state: &mut TestState,
    cycle: &Cycle<'_>,
    session: &dyn Session,
) -> Result<(), ActionError> {
    let node = session.read_node(cycle.node).await?;
    debug!("Action ({}) Node DisplayName is '{}'", cycle.description, node.display_name);
    debug!("Action ({}) Node Description is '{}'", cycle.description, node.description);

    let value = session.read_value(cycle.node).await?;
    let observed = match ObservedValue::capture(&value.value) {
        Ok(observed) => observed,
        Err(e) => {
            warn!(error = %e, "Cannot convert type of read value.");
            ObservedValue::Unrepresentable(UNREPRESENTABLE_VALUE)
        }
    };
    state.observed = Some(observed);

    debug!("Action ({}) Node data value is '{}'", cycle.description, value.value);
    Ok(())
}

pub(super) fn report_success(state: &TestState, action: &Action) {
    let shown = state
        .observed
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    info!("Value ({}): {}", action, shown);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NodeId;

    #[test]
    fn test_capture_scalars_and_flat_arrays() {
        assert_eq!(
            ObservedValue::capture(&Variant::Double(1.5)),
            Ok(ObservedValue::Typed(Variant::Double(1.5)))
        );
        let flat = Variant::Array(vec![Variant::Int64(1), Variant::Int64(2)]);
        assert!(ObservedValue::capture(&flat).is_ok());
    }

    #[test]
    fn test_capture_rejects_structures() {
        let ext = Variant::ExtensionObject {
            type_id: NodeId::numeric(0, 884),
            body: vec![1, 2, 3],
        };
        assert_eq!(
            ObservedValue::capture(&ext),
            Err(RepresentationError {
                type_name: "ExtensionObject"
            })
        );
        let nested = Variant::Array(vec![Variant::Array(vec![])]);
        assert!(ObservedValue::capture(&nested).is_err());
    }

    #[test]
    fn test_sentinel_display() {
        let v = ObservedValue::Unrepresentable(UNREPRESENTABLE_VALUE);
        assert_eq!(v.to_string(), UNREPRESENTABLE_VALUE);
    }
}
