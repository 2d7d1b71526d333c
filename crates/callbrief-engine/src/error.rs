use thiserror::Error;

use callbrief_gateway_api::GatewayError;
use callbrief_utils::CallbriefError;

use crate::orchestrator::Stage;

/// Fatal discovery outcomes. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("no calls found for account '{account}'")]
    NoSuchAccount { account: String },

    #[error("account '{account}' matches several folders: {}", .candidates.join(", "))]
    AmbiguousAccount {
        account: String,
        candidates: Vec<String>,
    },

    #[error("discovery for '{account}' failed: {source}")]
    Gateway {
        account: String,
        #[source]
        source: GatewayError,
    },
}

/// Run-level failure returned by the orchestrator.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("run cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("{summarized} call(s) summarized, at least {required} required")]
    NothingSummarized { required: usize, summarized: usize },

    #[error("{stage} failed: {source}")]
    Finalize {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    #[error("invalid stage transition {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

impl RunError {
    /// Stage in which the run stopped.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Discovery(_) => Stage::Discovering,
            Self::Cancelled { stage } | Self::Finalize { stage, .. } => *stage,
            Self::NothingSummarized { .. } => Stage::Processing,
            Self::InvalidTransition { from, .. } => *from,
        }
    }
}

impl From<RunError> for CallbriefError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Discovery(DiscoveryError::NoSuchAccount { account }) => {
                Self::NoSuchAccount { account }
            }
            RunError::Discovery(DiscoveryError::AmbiguousAccount {
                account,
                candidates,
            }) => Self::AmbiguousAccount {
                account,
                candidates,
            },
            RunError::Discovery(DiscoveryError::Gateway {
                account,
                source: source @ (GatewayError::Auth(_) | GatewayError::Misconfiguration(_)),
            }) => Self::DiscoveryRefused {
                account,
                reason: source.to_string(),
            },
            RunError::Discovery(DiscoveryError::Gateway { account, source }) => {
                Self::DiscoveryFailed {
                    account,
                    reason: source.to_string(),
                }
            }
            RunError::Cancelled { stage } => Self::Cancelled {
                stage: stage.to_string(),
            },
            RunError::NothingSummarized {
                required,
                summarized,
            } => Self::NothingSummarized {
                required,
                summarized,
            },
            RunError::Finalize { stage, source } => Self::FinalizeFailed {
                stage: stage.to_string(),
                reason: source.to_string(),
            },
            err @ RunError::InvalidTransition { .. } => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callbrief_utils::ExitCode;

    #[test]
    fn test_run_errors_map_to_exit_codes() {
        let cases: Vec<(RunError, ExitCode)> = vec![
            (
                DiscoveryError::NoSuchAccount {
                    account: "Foo".into(),
                }
                .into(),
                ExitCode::NO_SUCH_ACCOUNT,
            ),
            (
                DiscoveryError::AmbiguousAccount {
                    account: "Acme".into(),
                    candidates: vec!["Acme Corp".into(), "AcmeIO Inc".into()],
                }
                .into(),
                ExitCode::AMBIGUOUS_ACCOUNT,
            ),
            (
                RunError::Cancelled {
                    stage: Stage::Processing,
                },
                ExitCode::CANCELLED,
            ),
            (
                RunError::NothingSummarized {
                    required: 1,
                    summarized: 0,
                },
                ExitCode::NOTHING_SUMMARIZED,
            ),
            (
                RunError::Finalize {
                    stage: Stage::Writing,
                    source: GatewayError::Io("disk full".into()),
                },
                ExitCode::FINALIZE_FAILED,
            ),
            (
                DiscoveryError::Gateway {
                    account: "Foo".into(),
                    source: GatewayError::Auth("401 from Gong".into()),
                }
                .into(),
                ExitCode::CLI_ARGS,
            ),
            (
                DiscoveryError::Gateway {
                    account: "Foo".into(),
                    source: GatewayError::Misconfiguration("no base url".into()),
                }
                .into(),
                ExitCode::CLI_ARGS,
            ),
            (
                DiscoveryError::Gateway {
                    account: "Foo".into(),
                    source: GatewayError::InvalidResponse("bad JSON".into()),
                }
                .into(),
                ExitCode::INTERNAL,
            ),
        ];
        for (run_err, code) in cases {
            let shown = run_err.to_string();
            assert_eq!(CallbriefError::from(run_err).to_exit_code(), code, "{shown}");
        }
    }

    #[test]
    fn test_ambiguity_lists_candidates() {
        let err = DiscoveryError::AmbiguousAccount {
            account: "Acme".into(),
            candidates: vec!["Acme Corp".into(), "AcmeIO Inc".into()],
        };
        assert!(err.to_string().contains("Acme Corp, AcmeIO Inc"));
        assert_eq!(RunError::from(err).stage(), Stage::Discovering);
    }
}
