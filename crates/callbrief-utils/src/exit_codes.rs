//! Exit code constants for callbrief.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Run completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 3 | `NO_SUCH_ACCOUNT` | Discovery found no calls for the account |
//! | 4 | `AMBIGUOUS_ACCOUNT` | Discovery could not pick one account folder |
//! | 5 | `NOTHING_SUMMARIZED` | Fewer items summarized than the success threshold |
//! | 6 | `FINALIZE_FAILED` | Reduction, synthesis or write failed after retries |
//! | 130 | `CANCELLED` | Run cancelled by the user |

/// Process exit code.
///
/// The numeric values are part of the public CLI contract.
///
/// ```rust
/// use callbrief_utils::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::NO_SUCH_ACCOUNT.as_i32(), 3);
/// assert_eq!(ExitCode::from_i32(130), ExitCode::CANCELLED);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Run completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid or missing command-line arguments, or invalid configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// No calls were found for the requested account
    pub const NO_SUCH_ACCOUNT: ExitCode = ExitCode(3);

    /// Several account folders matched and none could be chosen
    pub const AMBIGUOUS_ACCOUNT: ExitCode = ExitCode(4);

    /// Too few items were summarized to call the run a success
    pub const NOTHING_SUMMARIZED: ExitCode = ExitCode(5);

    /// Reduction, synthesis or the final write failed after retries
    pub const FINALIZE_FAILED: ExitCode = ExitCode(6);

    /// Run cancelled (SIGINT convention)
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Create an exit code from a raw integer value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }

    /// Get the numeric exit code value for `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Whether this code reports success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_values_are_stable() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::NO_SUCH_ACCOUNT.as_i32(), 3);
        assert_eq!(ExitCode::AMBIGUOUS_ACCOUNT.as_i32(), 4);
        assert_eq!(ExitCode::NOTHING_SUMMARIZED.as_i32(), 5);
        assert_eq!(ExitCode::FINALIZE_FAILED.as_i32(), 6);
        assert_eq!(ExitCode::CANCELLED.as_i32(), 130);
    }

    #[test]
    fn test_only_zero_is_success() {
        assert!(ExitCode::SUCCESS.is_success());
        assert!(!ExitCode::NOTHING_SUMMARIZED.is_success());
        assert_eq!(i32::from(ExitCode::FINALIZE_FAILED), 6);
        assert_eq!(ExitCode::CANCELLED.to_string(), "130");
    }
}
