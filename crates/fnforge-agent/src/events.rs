//! Events emitted while a turn runs

/// Why a turn stopped short of a final text reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The caller cancelled the turn.
    Cancelled,
    /// The cycle ceiling was reached while the model kept requesting tools.
    CycleCeiling,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled"),
            AbortReason::CycleCeiling => write!(f, "cycle ceiling reached"),
        }
    }
}

/// Streamed progress of one turn. Sent over an mpsc channel so a transport
/// layer can relay them live; a closed receiver never fails the turn.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    TextDelta(String),
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolCallArguments {
        id: String,
        fragment: String,
    },
    /// A validated call handed to the dispatcher.
    ToolDispatched {
        id: String,
        name: String,
    },
    ToolResult {
        id: String,
        name: String,
        observation: String,
        is_failure: bool,
    },
    Done {
        cycles: usize,
    },
    Aborted {
        reason: AbortReason,
    },
    Error(String),
}
