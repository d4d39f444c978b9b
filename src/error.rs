use thiserror::Error;

/// Failures of the extraction passes. Both kinds abort the pass: downstream
/// consumers assume a complete mapping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// Unexpected paragraph/table content: missing level, unparsable value,
    /// dangling qualifier in a sphere list.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Structure that contradicts the cursor state: a sphere line with no
    /// deity, more spell domains than headings.
    #[error("inconsistent document: {0}")]
    Consistency(String),
}

impl ExtractError {
    pub fn in_table(self, table_no: usize) -> Self {
        match self {
            Self::MalformedDocument(msg) => {
                Self::MalformedDocument(format!("table {table_no}: {msg}"))
            }
            Self::Consistency(msg) => Self::Consistency(format!("table {table_no}: {msg}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
