pub mod disk;
pub mod error;
pub mod http_client;

pub use error::{UpdateError, UpdateResult};
