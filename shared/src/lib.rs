pub mod types;
pub mod schema;

pub use types::*;
pub use schema::*;
