use std::fmt;

/// Errors produced while loading funnel definitions from backend JSON.
///
/// Definition loading is the only fallible surface in this crate: the
/// backend payload is resolved into typed conditions exactly once, at load
/// time, so the trigger path never re-interprets loose JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The payload is neither a list nor an object wrapping a list.
    NotAList,
    /// A funnel entry is missing a required field.
    MissingField { funnel_id: String, field: String },
    /// A step declares an unknown trigger type.
    UnknownStepType { funnel_id: String, step_type: String },
    /// A step's condition does not match its declared type.
    BadCondition { funnel_id: String, message: String },
    /// A click step's selector failed to parse.
    BadSelector { funnel_id: String, selector: String },
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionError::NotAList => {
                write!(f, "funnel definitions payload is not a list")
            }
            DefinitionError::MissingField { funnel_id, field } => {
                write!(f, "funnel '{}' missing required field '{}'", funnel_id, field)
            }
            DefinitionError::UnknownStepType {
                funnel_id,
                step_type,
            } => {
                write!(
                    f,
                    "funnel '{}' has step with unknown type '{}'",
                    funnel_id, step_type
                )
            }
            DefinitionError::BadCondition { funnel_id, message } => {
                write!(f, "funnel '{}' has invalid condition: {}", funnel_id, message)
            }
            DefinitionError::BadSelector {
                funnel_id,
                selector,
            } => {
                write!(
                    f,
                    "funnel '{}' has unparseable selector '{}'",
                    funnel_id, selector
                )
            }
        }
    }
}

impl std::error::Error for DefinitionError {}
