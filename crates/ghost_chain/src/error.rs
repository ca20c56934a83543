use std::fmt;

/// Errors surfaced by the `Chain` facade: either a wrapped error from
/// whichever engine is active, an unrecognized `fork_choice_rule`, or an
/// I/O failure writing the visualization output.
#[derive(Debug)]
pub enum Error {
    Dag(ghost_dag::Error),
    ProtoArray(proto_array_fork_choice::Error),
    UnknownForkChoiceRule(String),
    Csv(csv::Error),
    Io(std::io::Error),
}

impl From<ghost_dag::Error> for Error {
    fn from(e: ghost_dag::Error) -> Self {
        Error::Dag(e)
    }
}

impl From<proto_array_fork_choice::Error> for Error {
    fn from(e: proto_array_fork_choice::Error) -> Self {
        Error::ProtoArray(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dag(e) => write!(f, "{}", e),
            Error::ProtoArray(e) => write!(f, "{}", e),
            Error::UnknownForkChoiceRule(s) => write!(f, "unknown fork_choice_rule '{}'", s),
            Error::Csv(e) => write!(f, "csv error: {}", e),
            Error::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
