use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypesError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed service profile: {0}")]
    MalformedProfile(String),

    #[error("invalid registration state: {0}")]
    InvalidRegistrationState(u8),

    #[error("encoding error: {0}")]
    Encoding(String),
}
