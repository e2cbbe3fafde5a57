//! Stabilizer-tableau simulation of Clifford circuits.
//!
//! Circuits built from H, S, the Paulis, CX and CZ plus computational-basis
//! measurement are simulated in polynomial time by tracking the generators
//! of the state's stabilizer group instead of the state itself. The
//! [`sample`] and [`sample_circuit`] drivers run a circuit for many
//! independent shots and aggregate the outcome bitstrings into relative
//! frequencies.

mod clifford_circuit;
mod error;
mod sample;
mod tableau;

pub use clifford_circuit::{CliffordCircuit, CliffordOp};
pub use error::{Result, SimulatorError};
pub use sample::{bitstring, sample, sample_circuit};
pub use tableau::StabilizerTableau;
