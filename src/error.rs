use thiserror::Error;

/// Errors raised by the lensing geometry and the profile fitter.
///
/// Configuration and state errors signal caller misuse and are never retried.
/// Convergence errors come straight from the solver; no bound relaxation or
/// restart is attempted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LensError {
    /// Invalid or contradictory arguments.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The operation needs a background catalog that was never set.
    #[error("state error: {0}")]
    State(String),

    /// The least-squares solver gave up before meeting any tolerance.
    #[error(
        "solver did not converge after {iterations} iterations (cost {cost:.6e}): {message}"
    )]
    Convergence {
        iterations: usize,
        cost: f64,
        message: String,
    },

    /// A geometric or physical quantity came out non-finite.
    #[error("domain error: {0}")]
    Domain(String),
}

impl LensError {
    pub fn config(message: impl Into<String>) -> Self {
        LensError::Configuration(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        LensError::State(message.into())
    }

    pub fn domain(message: impl Into<String>) -> Self {
        LensError::Domain(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convergence_message_includes_diagnostics() {
        let err = LensError::Convergence {
            iterations: 200,
            cost: 1.5,
            message: "iteration budget exhausted".into(),
        };
        let text = err.to_string();
        assert!(text.contains("200"));
        assert!(text.contains("iteration budget exhausted"));
    }
}
