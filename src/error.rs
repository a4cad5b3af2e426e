use thiserror::Error;

/// Errors that cross the supervisor/main boundary and decide the process exit code.
///
/// Everything upstream of this (element construction, property setting, caps
/// negotiation) is reported as `anyhow::Error` with `.context(...)` chains; it
/// only collapses into one of these variants once it needs to drive control flow.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("startup failed: {0}")]
    Startup(#[source] anyhow::Error),

    #[error("fatal pipeline error on {source_name}: {detail}")]
    Fatal { source_name: String, detail: String },

    #[error("failed to build graph element {element}: {source}")]
    GstBuild {
        element: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl RelayError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::Startup(_) => 2,
            RelayError::Fatal { .. } => 1,
            RelayError::GstBuild { .. } => 2,
        }
    }
}
