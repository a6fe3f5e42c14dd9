use cvm_backend::{CvmError, ErrorKind};
use cvm_exec::{ExecError, ReplayError};
use cvm_platform::PathsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Cvm(#[from] CvmError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Paths(#[from] PathsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ReplayError> for CliError {
    fn from(error: ReplayError) -> Self {
        match error {
            ReplayError::Cvm(e) => Self::Cvm(e),
            ReplayError::Exec(e) => Self::Exec(e),
        }
    }
}

impl CliError {
    /// Bad input exits with 2, like a clap usage error; everything else
    /// with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cvm(e) if e.kind() == ErrorKind::UserInput => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use cvm_backend::CvmError;

    use super::CliError;

    #[test]
    fn user_input_errors_exit_with_usage_code() {
        assert_eq!(CliError::from(CvmError::MissingCommand).exit_code(), 2);
        assert_eq!(
            CliError::from(CvmError::version_not_found("9.9.9")).exit_code(),
            1
        );
        assert_eq!(
            CliError::from(CvmError::Blocked {
                version: "1.0.0".to_string()
            })
            .exit_code(),
            1
        );
    }
}
