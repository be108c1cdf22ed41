pub mod connection;
pub mod runs;
pub mod seen;

pub use connection::{init_db, Database};
pub use seen::DedupStore;
