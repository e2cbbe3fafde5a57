use thiserror::Error;

/// Errors that can occur while building or simulating a Clifford circuit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulatorError {
    /// A gate or measurement addressed a qubit outside the tableau.
    #[error("invalid qubit index {qubit} for {qubits} qubits")]
    InvalidQubitIndex { qubit: usize, qubits: usize },

    /// A two-qubit gate was given the same qubit for both operands.
    #[error("duplicate qubit {0} in two-qubit gate")]
    DuplicateQubit(usize),

    /// A tableau or circuit must track at least one qubit.
    #[error("qubit count must be at least one")]
    NoQubits,

    /// Sampling requires at least one shot.
    #[error("shot count must be positive")]
    NoShots,

    /// A product of sign-bearing generator rows carried an imaginary phase.
    /// Commuting stabilizers always multiply to a real phase, so this means
    /// the tableau invariant is broken and the current shot cannot be
    /// trusted.
    #[error("generator product has imaginary phase exponent {residue}")]
    InconsistentPhase { residue: u8 },
}

/// Type alias for results in this crate.
pub type Result<T> = std::result::Result<T, SimulatorError>;
