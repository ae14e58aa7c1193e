use std::fmt;

/// Where a kernel is in its boot sequence.
///
/// Transitions only move forward:
/// `Created → Discovered → Validated → Registered → Resolved →
/// Instantiating → Booted`, or to `Failed` from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootState {
    /// Nothing has run yet.
    Created,
    /// Sources were scanned.
    Discovered,
    /// Governance passed.
    Validated,
    /// Descriptors and adapters are registered.
    Registered,
    /// The instantiation order is known.
    Resolved,
    /// Building modules.
    Instantiating {
        /// Position in the instantiation order.
        index: usize,
        /// The module being built.
        module: String,
    },
    /// Every module is instantiated and published.
    Booted,
    /// Boot aborted.
    Failed {
        /// The stage that failed.
        stage: String,
        /// The rendered error.
        reason: String,
    },
}

impl BootState {
    /// The stage that runs next from this state.
    #[must_use]
    pub fn pending_stage(&self) -> &'static str {
        match self {
            Self::Created => "discovery",
            Self::Discovered => "governance",
            Self::Validated => "registration",
            Self::Registered => "resolution",
            Self::Resolved | Self::Instantiating { .. } => "instantiation",
            Self::Booted | Self::Failed { .. } => "none",
        }
    }

    /// Whether the boot sequence has ended.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Booted | Self::Failed { .. })
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Discovered => f.write_str("discovered"),
            Self::Validated => f.write_str("validated"),
            Self::Registered => f.write_str("registered"),
            Self::Resolved => f.write_str("resolved"),
            Self::Instantiating { index, module } => {
                write!(f, "instantiating #{index} ({module})")
            },
            Self::Booted => f.write_str("booted"),
            Self::Failed { stage, .. } => write!(f, "failed during {stage}"),
        }
    }
}
