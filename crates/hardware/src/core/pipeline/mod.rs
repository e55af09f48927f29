//! Out-of-order pipeline: the instruction queue, predicative register file,
//! scheduling queue, load-store buffer, and reorder buffer, plus the driver
//! that advances them all through one cycle's five ordered phases.

/// Out-of-order engine: owns every structural buffer and runs the five-phase
/// `tick()` (commit, memory-execute, execute, dispatch/rename, fetch).
pub mod driver;

/// Instruction queue: circular fetch buffer with pending-fetch placeholders.
pub mod iq;

/// Load-store buffer: program-ordered memory ops with disambiguation and
/// store-to-load forwarding.
pub mod lsb;

/// Predicative register file: the speculative rename map.
pub mod predicative_rf;

/// Reorder buffer: in-order commit and precise speculative recovery.
pub mod rob;

/// Scheduling queue: the ALU reservation stations.
pub mod sq;

pub use self::driver::O3Engine;
