use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, SimulatorError};

/// One operation in a Clifford circuit: a gate on 0-based qubit indices, or
/// a computational-basis measurement.
///
/// The second index of [`CliffordOp::Measure`] is a classical-register label
/// kept for parity with circuit formats that require one; the simulator
/// records outcomes by qubit and ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliffordOp {
    X(usize),
    Y(usize),
    Z(usize),

    S(usize),
    H(usize),

    Cx(usize, usize),
    Cz(usize, usize),

    Measure(usize, usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliffordCircuit {
    /// The number of qubits in the circuit.
    qubits: usize,
    /// The ordered list of operations in the circuit.
    ops: Vec<CliffordOp>,
}

impl CliffordCircuit {
    /// Create a circuit over `qubits` qubits, validating every operand
    /// index eagerly so that replaying the circuit cannot fail on a bad
    /// index.
    pub fn new(qubits: usize, ops: impl IntoIterator<Item = CliffordOp>) -> Result<Self> {
        if qubits == 0 {
            return Err(SimulatorError::NoQubits);
        }
        let ops: Vec<CliffordOp> = ops.into_iter().collect();
        let check_index = |a: usize| {
            if a < qubits {
                Ok(())
            } else {
                Err(SimulatorError::InvalidQubitIndex { qubit: a, qubits })
            }
        };
        for &op in &ops {
            match op {
                CliffordOp::X(a)
                | CliffordOp::Y(a)
                | CliffordOp::Z(a)
                | CliffordOp::S(a)
                | CliffordOp::H(a)
                | CliffordOp::Measure(a, _) => check_index(a)?,
                CliffordOp::Cx(a, b) | CliffordOp::Cz(a, b) => {
                    check_index(a)?;
                    check_index(b)?;
                    if a == b {
                        return Err(SimulatorError::DuplicateQubit(a));
                    }
                }
            }
        }
        Ok(CliffordCircuit { qubits, ops })
    }

    /// Create a random measurement-free circuit with the given number of
    /// `qubits` and `ops`.
    pub fn random(qubits: usize, ops: usize, seed: u64) -> Self {
        assert!(qubits > 0, "qubits must be greater than 0");
        let mut rng = SmallRng::seed_from_u64(seed);
        CliffordCircuit {
            qubits,
            ops: (0..ops)
                .map(|_| {
                    let a = rng.random_range(0..qubits);
                    // A circuit on a single qubit has no two-qubit gates to
                    // draw from.
                    let kinds = if qubits > 1 { 7 } else { 5 };
                    match rng.random_range(0..kinds) {
                        0 => CliffordOp::X(a),
                        1 => CliffordOp::Y(a),
                        2 => CliffordOp::Z(a),
                        3 => CliffordOp::S(a),
                        4 => CliffordOp::H(a),
                        kind => {
                            let mut b = a;
                            while b == a {
                                b = rng.random_range(0..qubits);
                            }
                            if kind == 5 {
                                CliffordOp::Cx(a, b)
                            } else {
                                CliffordOp::Cz(a, b)
                            }
                        }
                    }
                })
                .collect(),
        }
    }

    /// The number of qubits in the circuit.
    pub fn qubits(&self) -> usize {
        self.qubits
    }

    /// The operations in the circuit, in the order that they are applied.
    pub fn ops(&self) -> &[CliffordOp] {
        &self.ops
    }
}
