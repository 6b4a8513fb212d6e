pub mod task;

pub use task::{Classification, TaskRecord, DATE_FORMAT, TIMESTAMP_FORMAT};
