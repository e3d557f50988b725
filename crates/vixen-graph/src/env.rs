//! Process environment surface for the outer benchmark binary (spec §6
//! "Environment", §7 exit codes). The library itself never calls
//! [`std::process::exit`] — these types only give the (non-goal) CLI
//! surface a stable vocabulary to report through.

/// Process exit codes, one per top-level failure category (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Ran to completion with no error.
    Success,
    /// Device/graph/config setup failed before any frame ran.
    InitFailure,
    /// Graph compile rejected the configuration (`GraphError::InvalidGraph`
    /// and friends).
    ValidationFailure,
    /// A memory budget was exceeded (`GraphError::BudgetExceeded`).
    BudgetExceeded,
    /// The GPU API returned a non-success result.
    GpuError,
    /// The user interrupted the run.
    UserAbort,
}

impl ExitCode {
    /// The process exit status spec §6 assigns to this code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InitFailure => 1,
            Self::ValidationFailure => 2,
            Self::BudgetExceeded => 3,
            Self::GpuError => 4,
            Self::UserAbort => 5,
        }
    }
}

impl From<&crate::error::GraphError> for ExitCode {
    fn from(err: &crate::error::GraphError) -> Self {
        use crate::error::GraphError;
        match err {
            GraphError::InvalidGraph(_)
            | GraphError::MissingDependency { .. }
            | GraphError::CapabilityMissing(_)
            | GraphError::ConnectionFailed(_)
            | GraphError::AliasConflict { .. }
            | GraphError::InvalidState(_) => Self::ValidationFailure,
            GraphError::BudgetExceeded { .. } | GraphError::OutOfMemory { .. } => Self::BudgetExceeded,
            GraphError::Gpu(_) => Self::GpuError,
            GraphError::CacheBuildFailed { source, .. } => Self::from(source.as_ref()),
        }
    }
}

/// Environment variable spec §6 names for overriding the hostname used to
/// tag benchmark results.
pub const MACHINE_NAME_VAR: &str = "VIXEN_MACHINE_NAME";

/// Resolve the machine name results should be tagged with: `VIXEN_MACHINE_NAME`
/// if set, else the OS hostname, else `"unknown"`.
#[must_use]
pub fn machine_name() -> String {
    if let Ok(name) = std::env::var(MACHINE_NAME_VAR) {
        if !name.is_empty() {
            return name;
        }
    }
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.is_empty() {
                return name;
            }
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;

    #[test]
    fn exit_codes_match_documented_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::InitFailure.code(), 1);
        assert_eq!(ExitCode::ValidationFailure.code(), 2);
        assert_eq!(ExitCode::BudgetExceeded.code(), 3);
        assert_eq!(ExitCode::GpuError.code(), 4);
        assert_eq!(ExitCode::UserAbort.code(), 5);
    }

    #[test]
    fn graph_error_maps_to_validation_failure() {
        let err = GraphError::InvalidGraph("cycle".into());
        assert_eq!(ExitCode::from(&err), ExitCode::ValidationFailure);
    }

    #[test]
    fn budget_exceeded_maps_through_cache_build_failed() {
        let inner = GraphError::BudgetExceeded { class: "DeviceLocal".into(), requested: 10, available: 5 };
        let wrapped = GraphError::CacheBuildFailed { key: "scene:1".into(), source: Box::new(inner) };
        assert_eq!(ExitCode::from(&wrapped), ExitCode::BudgetExceeded);
    }

    #[test]
    fn machine_name_is_never_empty() {
        assert!(!machine_name().is_empty());
    }
}
