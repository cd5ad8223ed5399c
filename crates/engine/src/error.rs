use std::fmt;

#[derive(Debug)]
pub enum AuditError {
    /// Required column not found in a reference dataset. Fatal to that load;
    /// no partial index is built.
    MissingColumn { source_name: String, column: String },
    /// Reference dataset has no usable rows at all.
    EmptyTable { source_name: String },
    /// Claim markup is structurally invalid after entity sanitization.
    MalformedXml(String),
    /// Multiplier config parse / deserialization error.
    ConfigParse(String),
    /// IO error (file read, etc.) surfaced by a caller.
    Io(String),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { source_name, column } => {
                write!(f, "{source_name}: missing required column '{column}'")
            }
            Self::EmptyTable { source_name } => {
                write!(f, "{source_name}: no data rows found")
            }
            Self::MalformedXml(msg) => write!(f, "invalid claim XML: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for AuditError {}
