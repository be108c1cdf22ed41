pub mod dates;
pub mod listing;

pub use listing::{ExternalId, Listing};
