pub mod aggregate;
pub mod delete;
pub mod distinct;
pub mod insert;
pub mod join;
pub mod seq_scan;
pub mod update;

pub use aggregate::AggregationExecutor;
pub use delete::DeleteExecutor;
pub use distinct::DistinctExecutor;
pub use insert::InsertExecutor;
pub use join::{HashJoinExecutor, NestedLoopJoinExecutor};
pub use seq_scan::SeqScanExecutor;
pub use update::UpdateExecutor;
