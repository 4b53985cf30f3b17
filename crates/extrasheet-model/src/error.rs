/// Failure to decode or encode a spreadsheet folder.
///
/// Every variant names the file (relative to the folder root) and, where one
/// applies, the key or address inside it.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{file}: required file is missing")]
    MissingFile { file: String },

    #[error("{file}: not valid UTF-8")]
    NotUtf8 { file: String },

    #[error("{file}: malformed JSON: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{file}: {key}: {message}")]
    Invalid {
        file: String,
        key: String,
        message: String,
    },
}

impl CodecError {
    pub fn invalid(file: &str, key: impl Into<String>, message: impl ToString) -> Self {
        CodecError::Invalid {
            file: file.to_string(),
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// The file the error refers to.
    pub fn file(&self) -> &str {
        match self {
            CodecError::MissingFile { file }
            | CodecError::NotUtf8 { file }
            | CodecError::Json { file, .. }
            | CodecError::Invalid { file, .. } => file,
        }
    }
}
