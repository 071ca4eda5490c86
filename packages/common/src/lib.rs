pub mod catalog;
pub mod config;
pub mod error;
pub mod placement;
pub mod policy;
pub mod publish;
pub mod service;
pub mod storage;

pub use error::{Error, ErrorKind, Result};
pub use placement::{Category, Classification};
pub use service::AssetService;
