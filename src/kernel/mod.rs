// Synchronisation between the application task and the transfer task
//
// pipeline: shared state (frame store, job FIFO, completion, stats)
// completion: idle flag + Signal the app waits on
// claim: exclusive ownership of the panel, held by the transfer engine
// tasks: embassy task wrapper for the transfer engine (board only)

pub mod claim;
pub mod completion;
pub mod pipeline;
pub mod stats;
#[cfg(feature = "board")]
pub mod tasks;

pub use pipeline::{EngineState, JOB_QUEUE_DEPTH, Pipeline};
pub use stats::TransferStats;
