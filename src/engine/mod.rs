pub mod process;
pub mod types;

use crate::error::Result;

pub use types::{EngineDiag, EngineExit, EngineRequest, PlayerSpec, PlayerStats, ResultDocument};

/// The simulation engine, seen from the job runner.
///
/// `progress` receives percentages in the order the engine reports them; the
/// runner is responsible for monotonicity. An `Err` means the engine could not
/// be run to completion at all (spawn failure, timeout).
pub trait Engine: Send + Sync {
    fn run(&self, request: &EngineRequest, progress: &mut dyn FnMut(u8)) -> Result<EngineExit>;
}
