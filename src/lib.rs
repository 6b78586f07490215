use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SerializationError: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YamlError: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid URL {url:?} in {field}: {source}")]
    InvalidUrl {
        field: String,
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to {operation}: {source}")]
    ClusterRead {
        operation: String,
        #[source]
        source: kube::Error,
    },

    #[error("Timed out after {timeout:?} trying to {operation}")]
    ClusterReadTimeout { operation: String, timeout: Duration },

    // invariant violations inside the engine rather than problems with the workload spec
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{workload}: {source}")]
    Workload {
        workload: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::SerializationError(_) => "SerializationError",
            Error::YamlError(_) => "YamlError",
            Error::InvalidConfiguration(_) => "InvalidConfiguration",
            Error::InvalidUrl { .. } => "InvalidUrl",
            Error::ClusterRead { .. } => "ClusterRead",
            Error::ClusterReadTimeout { .. } => "ClusterReadTimeout",
            Error::Internal(_) => "Internal",
            Error::Workload { source, .. } => source.metric_label(),
        }
    }

    /// True when the workload owner has to fix their manifest, as opposed to
    /// the cluster or the engine being at fault.
    pub fn is_user_error(&self) -> bool {
        match self {
            Error::InvalidConfiguration(_) | Error::InvalidUrl { .. } => true,
            Error::Workload { source, .. } => source.is_user_error(),
            _ => false,
        }
    }

    pub(crate) fn for_workload(self, workload: impl Into<String>) -> Self {
        match self {
            // never double wrap
            err @ Error::Workload { .. } => err,
            err => Error::Workload {
                workload: workload.into(),
                source: Box::new(err),
            },
        }
    }
}

pub mod ast;
pub mod cluster;
pub mod config;
pub mod generators;
pub mod hash;
pub mod namegen;
pub mod options;
pub mod source;
pub mod synthesis;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;

pub use metrics::Metrics;

/// Input CRDs and the external CRDs generated by the engine
pub mod resources;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_errors_keep_their_category() {
        let err = Error::InvalidConfiguration("spec.ingresses[0]: no gateway".into())
            .for_workload("aura/myapp");
        assert!(err.is_user_error());
        assert_eq!(err.metric_label(), "InvalidConfiguration");
        assert_eq!(
            err.to_string(),
            "aura/myapp: Invalid configuration: spec.ingresses[0]: no gateway"
        );

        let err = Error::Internal("no main container".into()).for_workload("aura/myapp");
        assert!(!err.is_user_error());
        assert_eq!(err.metric_label(), "Internal");
    }

    #[test]
    fn workload_errors_are_not_wrapped_twice() {
        let err = Error::Internal("boom".into())
            .for_workload("a/b")
            .for_workload("c/d");
        assert_eq!(err.to_string(), "a/b: Internal error: boom");
    }
}
