//! Simulator fault/event definitions.
//!
//! The core does not model precise exceptions: the only "errors" it can raise are
//! simulator-level events that stop a run rather than architectural traps.

use std::fmt;
use std::io;

/// A fatal simulator event.
#[derive(Debug)]
pub enum SimFault {
    /// The decoder was handed an encoding it does not recognize.
    IllegalInstruction { pc: u32, instruction: u32 },
    /// A program or data image could not be loaded from disk.
    Io(io::Error),
}

impl fmt::Display for SimFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimFault::IllegalInstruction { pc, instruction } => write!(
                f,
                "illegal instruction {instruction:#010x} at pc {pc:#010x}"
            ),
            SimFault::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for SimFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimFault::Io(e) => Some(e),
            SimFault::IllegalInstruction { .. } => None,
        }
    }
}

impl From<io::Error> for SimFault {
    fn from(e: io::Error) -> Self {
        SimFault::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_instruction_display_includes_pc_and_word() {
        let fault = SimFault::IllegalInstruction {
            pc: 0x1000,
            instruction: 0xffff_ffff,
        };
        let text = fault.to_string();
        assert!(text.contains("1000"));
        assert!(text.contains("ffffffff"));
    }

    #[test]
    fn io_error_round_trips_through_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let fault: SimFault = io_err.into();
        assert!(fault.to_string().contains("missing"));
    }
}
