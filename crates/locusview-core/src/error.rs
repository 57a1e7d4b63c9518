pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("layout merge only accepts two layout objects; {custom}, {default} given")]
    LayoutMerge {
        custom: &'static str,
        default: &'static str,
    },

    #[error("invalid layout: {message}")]
    InvalidLayout { message: String },

    #[error("Source not initialized with required URL")]
    MissingUrl,

    #[error("Unable to resolve {type_name} data source")]
    UnknownSourceType { type_name: String },

    #[error("Datasource for namespace {namespace} not found")]
    MissingDataSource { namespace: String },

    #[error("transformation {name} not found")]
    UnknownTransform { name: String },

    #[error("{kind} function [{name}] not found")]
    UnknownFunction { kind: &'static str, name: String },

    #[error("{kind} already exists with name: {name}")]
    RegistryConflict { kind: &'static str, name: String },

    #[error("{kind} name should not start with a pipe: {name}")]
    InvalidFunctionName { kind: &'static str, name: String },

    #[error("invalid field request: {message}")]
    InvalidRequest { message: String },

    #[error("field {field} not found in response for {outname}")]
    MissingField { field: String, outname: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("invalid response from {source_name}: {message}")]
    InvalidResponse {
        source_name: String,
        message: String,
    },

    #[error("Unable to parse JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Configuration errors are raised while building sources, layouts or registries and are never
    /// worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::LayoutMerge { .. }
                | Error::InvalidLayout { .. }
                | Error::MissingUrl
                | Error::UnknownSourceType { .. }
                | Error::RegistryConflict { .. }
                | Error::InvalidFunctionName { .. }
                | Error::Url(_)
        )
    }

    pub(crate) fn invalid_response(source_name: &str, message: impl Into<String>) -> Self {
        Error::InvalidResponse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}
