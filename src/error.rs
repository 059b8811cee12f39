use thiserror::Error;

#[derive(Error, Debug)]
pub enum OELensError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid build directory: {0}")]
    Layout(String),

    #[error("Malformed build report: {0}")]
    Report(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Database error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("BSON serialization error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),
}

pub type Result<T> = std::result::Result<T, OELensError>;
