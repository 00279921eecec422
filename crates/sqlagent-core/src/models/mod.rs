pub mod ids;
pub mod query;

pub use ids::{QueryId, ThreadId};
pub use query::{QueryDetail, QueryRecord, QueryStatus};
