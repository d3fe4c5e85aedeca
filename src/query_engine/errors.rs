use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryEngineError {
    #[error("Unknown entity '{0}' in data set")]
    UnknownEntity(String),

    #[error("Alias '{0}' is not bound in this scope")]
    UnboundAlias(String),

    #[error("No value supplied for parameter :{0}")]
    UnboundParameter(String),

    #[error("{operation} is not defined for {found}")]
    TypeMismatch {
        operation: String,
        found: &'static str,
    },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Integer overflow in {0}")]
    IntegerOverflow(String),

    #[error("Invalid like pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Sequence contains no elements")]
    EmptySequence,

    #[error("Sequence contains more than one element")]
    MoreThanOneElement,

    #[error("Invalid data set: {0}")]
    InvalidDataSet(#[from] serde_json::Error),
}
