pub mod config;
pub mod download;
pub mod http;

pub use config::ClientConfig;
pub use download::{DirectorySaver, SaveFile};
pub use http::{FetchError, FetchResponse, RequestClient, RequestDescriptor, ResponseData};
