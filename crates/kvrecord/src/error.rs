use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("{0}")]
    RecordNotFound(String),

    #[error("{0}")]
    RecordNotSaved(String),

    #[error("{0}")]
    RecordNotDestroyed(String),

    #[error("{0}")]
    ReadOnlyRecord(String),

    #[error("{attribute} is not a valid attribute of {model}")]
    InvalidAttribute { model: String, attribute: String },

    #[error("Invalid value for {attribute}: expected {expected}, got {got}")]
    InvalidValue {
        attribute: String,
        expected: &'static str,
        got: String,
    },

    #[error("Validation failed: {0}")]
    RecordInvalid(String),

    #[error("Could not find version {0}")]
    VersionNotFound(u64),

    #[error("Wanted only one {model}, but found {found} records")]
    SoleRecordExceeded { model: String, found: usize },

    #[error("{0}")]
    ParentModelNotSavedYet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RecordError {
    pub(crate) fn invalid_attribute(model: &str, attribute: &str) -> Self {
        RecordError::InvalidAttribute {
            model: model.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invalid_id(id: &str) -> Self {
        RecordError::InvalidValue {
            attribute: "id".to_string(),
            expected: "id not starting with ':'",
            got: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
