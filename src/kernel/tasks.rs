// Embassy tasks for the board build
//
// The transfer engine runs as its own task so the main task can draw the
// next frame while the previous one streams out. Embassy tasks cannot be
// generic, hence the concrete board types here.

use log::info;

use super::pipeline::Pipeline;
use crate::board::{DcPin, DisplaySpi};
use crate::drivers::transfer::TransferEngine;

/// The one pipeline on the board. Shared by `Display` and the transfer task.
pub static PIPELINE: Pipeline = Pipeline::new();

pub type BoardEngine = TransferEngine<'static, DisplaySpi, DcPin>;

/// Serves strip jobs until `Display::end()` sends Shutdown.
#[embassy_executor::task]
pub async fn transfer_task(engine: BoardEngine) {
    let _panel = engine.run().await;
    info!("[XFER] task exit");
}
