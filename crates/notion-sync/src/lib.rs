pub mod api;
pub mod destination;
pub mod source;

pub use api::{NotionApi, NotionApiError};
pub use destination::NotionDestination;
pub use source::NotionRequestSource;
