/// Errors that can occur in fragsift.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("data consistency error: {0}")]
    DataConsistency(String),

    #[error("provider contract violation: {0}")]
    ProviderContract(String),

    #[error("insufficient signal: {0}")]
    InsufficientSignal(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<rust_htslib::errors::Error> for Error {
    fn from(err: rust_htslib::errors::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub fn handle_error_and_exit(err: Error) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}
