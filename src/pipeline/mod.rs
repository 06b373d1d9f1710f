pub mod engine;
pub mod record;
pub mod report;
pub mod stage;
pub mod summary;

pub use engine::Pipeline;
pub use record::{RunRecord, Stage};
pub use report::{interpret, Outcome, RunReport};
pub use stage::{ErrorKind, StageAbort};
