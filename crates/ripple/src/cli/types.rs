//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::executor::FailurePolicy;

/// Failure policy for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Skip every transitive dependent of a failed task
    #[value(name = "stop-on-fail")]
    StopOnFail,
    /// Keep running dependents that still have a succeeded dependency
    #[value(name = "continue-on-fail")]
    ContinueOnFail,
}

impl std::fmt::Display for PolicyArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopOnFail => write!(f, "stop-on-fail"),
            Self::ContinueOnFail => write!(f, "continue-on-fail"),
        }
    }
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::StopOnFail => Self::StopOnFail,
            PolicyArg::ContinueOnFail => Self::ContinueOnFail,
        }
    }
}
