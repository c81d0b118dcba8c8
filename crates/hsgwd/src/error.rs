use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Kv(#[from] hsgw_middleware::KvError),

    #[error(transparent)]
    Prov(#[from] hsgw_provstore::ProvError),

    #[error(transparent)]
    Diameter(#[from] hsgw_diameter::DiameterError),
}
