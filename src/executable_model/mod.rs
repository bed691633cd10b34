
pub use api_server::{ApiServer, Verb};
