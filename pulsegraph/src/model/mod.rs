pub mod record;
pub mod value;

pub use record::{Record, RecordArena, RecordId};
pub use value::Value;
