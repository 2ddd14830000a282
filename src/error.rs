pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Upload rejected with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{transport} upload failed: {error}")]
    Upload {
        transport: &'static str,
        error: Box<Error>,
    },
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),
}
