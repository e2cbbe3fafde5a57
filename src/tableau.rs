use std::fmt;
use std::mem;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::clifford_circuit::CliffordOp;
use crate::error::{Result, SimulatorError};

type BitBlock = u64;
const BLOCK_SIZE: usize = mem::size_of::<BitBlock>() * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pauli {
    I,
    X,
    Y,
    Z,
}

/// The stabilizer tableau of one simulation run.
///
/// The generators of the state,
/// ```text
/// D1 -> x1 x2 ... xn | z1 z2 ... zn | r
/// ...
/// Dn -> x1 x2 ... xn | z1 z2 ... zn | r
/// S1 -> x1 x2 ... xn | z1 z2 ... zn | r
/// ...
/// Sn -> x1 x2 ... xn | z1 z2 ... zn | r
/// (E -> x1 x2 ... xn | z1 z2 ... zn | r)
/// ```
/// are laid out row-wise in a flat block vector: destabilizers first, then
/// stabilizers, then the scratch row E, which is only ever populated inside
/// [`StabilizerTableau::measure`]. The x, z and r parts of each row are
/// right-padded with zeros to take up a whole number of blocks.
pub struct StabilizerTableau {
    n: usize,
    rows: Vec<BitBlock>,
    rng: SmallRng,
    outcomes: Vec<Option<bool>>,
    deterministic: Vec<Option<bool>>,
}

impl StabilizerTableau {
    /// Initialize the tableau for `n` qubits in the all-zero state, with
    /// randomness drawn from OS entropy.
    pub fn new(n: usize) -> Result<Self> {
        Self::with_rng(n, SmallRng::from_os_rng())
    }

    /// Initialize the tableau for `n` qubits in the all-zero state, with a
    /// reproducible randomness stream derived from `seed`.
    pub fn with_seed(n: usize, seed: u64) -> Result<Self> {
        Self::with_rng(n, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(n: usize, rng: SmallRng) -> Result<Self> {
        if n == 0 {
            return Err(SimulatorError::NoQubits);
        }
        let mut rows = vec![0; tableau_block_length(n)];
        for i in 0..n {
            // Destabilizer i is X on qubit i, stabilizer i is Z on qubit i.
            rows[x_block_index(n, i, i / BLOCK_SIZE)] = bitmask(i % BLOCK_SIZE);
            rows[z_block_index(n, n + i, i / BLOCK_SIZE)] = bitmask(i % BLOCK_SIZE);
        }
        Ok(StabilizerTableau {
            n,
            rows,
            rng,
            outcomes: vec![None; n],
            deterministic: vec![None; n],
        })
    }

    /// The number of qubits tracked by the tableau.
    pub fn qubits(&self) -> usize {
        self.n
    }

    /// Apply the Pauli X gate to the given qubit.
    pub fn x(&mut self, qubit: usize) -> Result<()> {
        self.check_qubit(qubit)?;
        let n = self.n;
        let bit = qubit % BLOCK_SIZE;
        let mask = bitmask(bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let z_block = z_block_index(n, row, qubit / BLOCK_SIZE);
            self.rows[r_block] ^= align_bit_to(self.rows[z_block] & mask, bit, 0);
        }
        Ok(())
    }

    /// Apply the Pauli Y gate to the given qubit.
    pub fn y(&mut self, qubit: usize) -> Result<()> {
        self.check_qubit(qubit)?;
        let n = self.n;
        let bit = qubit % BLOCK_SIZE;
        let mask = bitmask(bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let x_block = x_block_index(n, row, qubit / BLOCK_SIZE);
            let z_block = z_block_index(n, row, qubit / BLOCK_SIZE);
            self.rows[r_block] ^= align_bit_to(self.rows[x_block] & mask, bit, 0)
                ^ align_bit_to(self.rows[z_block] & mask, bit, 0);
        }
        Ok(())
    }

    /// Apply the Pauli Z gate to the given qubit.
    pub fn z(&mut self, qubit: usize) -> Result<()> {
        self.check_qubit(qubit)?;
        let n = self.n;
        let bit = qubit % BLOCK_SIZE;
        let mask = bitmask(bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let x_block = x_block_index(n, row, qubit / BLOCK_SIZE);
            self.rows[r_block] ^= align_bit_to(self.rows[x_block] & mask, bit, 0);
        }
        Ok(())
    }

    /// Apply the Hadamard gate to the given qubit.
    pub fn h(&mut self, qubit: usize) -> Result<()> {
        self.check_qubit(qubit)?;
        let n = self.n;
        let bit = qubit % BLOCK_SIZE;
        let mask = bitmask(bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let x_block = x_block_index(n, row, qubit / BLOCK_SIZE);
            let z_block = z_block_index(n, row, qubit / BLOCK_SIZE);
            self.rows[r_block] ^=
                align_bit_to(self.rows[x_block] & self.rows[z_block] & mask, bit, 0);
            // Swap the x and z bits.
            self.rows[z_block] ^= self.rows[x_block] & mask;
            self.rows[x_block] ^= self.rows[z_block] & mask;
            self.rows[z_block] ^= self.rows[x_block] & mask;
        }
        Ok(())
    }

    /// Apply the phase gate S to the given qubit.
    pub fn s(&mut self, qubit: usize) -> Result<()> {
        self.check_qubit(qubit)?;
        let n = self.n;
        let bit = qubit % BLOCK_SIZE;
        let mask = bitmask(bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let x_block = x_block_index(n, row, qubit / BLOCK_SIZE);
            let z_block = z_block_index(n, row, qubit / BLOCK_SIZE);
            self.rows[r_block] ^=
                align_bit_to(self.rows[x_block] & self.rows[z_block] & mask, bit, 0);
            self.rows[z_block] ^= self.rows[x_block] & mask;
        }
        Ok(())
    }

    /// Apply the controlled-X gate with the given control and target qubits.
    pub fn cx(&mut self, control: usize, target: usize) -> Result<()> {
        self.check_qubit(control)?;
        self.check_qubit(target)?;
        if control == target {
            return Err(SimulatorError::DuplicateQubit(control));
        }
        let n = self.n;
        let c_bit = control % BLOCK_SIZE;
        let t_bit = target % BLOCK_SIZE;
        let c_mask = bitmask(c_bit);
        let t_mask = bitmask(t_bit);
        for row in 0..2 * n {
            let r_block = r_block_index(n, row);
            let xc_block = x_block_index(n, row, control / BLOCK_SIZE);
            let zc_block = z_block_index(n, row, control / BLOCK_SIZE);
            let xt_block = x_block_index(n, row, target / BLOCK_SIZE);
            let zt_block = z_block_index(n, row, target / BLOCK_SIZE);

            self.rows[r_block] ^= align_bit_to(self.rows[xc_block] & c_mask, c_bit, 0)
                & align_bit_to(self.rows[zt_block] & t_mask, t_bit, 0)
                & !(align_bit_to(self.rows[xt_block] & t_mask, t_bit, 0)
                    ^ align_bit_to(self.rows[zc_block] & c_mask, c_bit, 0));
            self.rows[zc_block] ^= align_bit_to(self.rows[zt_block] & t_mask, t_bit, c_bit);
            self.rows[xt_block] ^= align_bit_to(self.rows[xc_block] & c_mask, c_bit, t_bit);
        }
        Ok(())
    }

    /// Apply the controlled-Z gate, expressed as CX conjugated by a basis
    /// change on the target.
    pub fn cz(&mut self, control: usize, target: usize) -> Result<()> {
        self.check_qubit(control)?;
        self.check_qubit(target)?;
        if control == target {
            return Err(SimulatorError::DuplicateQubit(control));
        }
        self.h(target)?;
        self.cx(control, target)?;
        self.h(target)
    }

    /// Apply a circuit operation to the tableau.
    pub fn apply(&mut self, op: CliffordOp) -> Result<()> {
        match op {
            CliffordOp::X(a) => self.x(a),
            CliffordOp::Y(a) => self.y(a),
            CliffordOp::Z(a) => self.z(a),
            CliffordOp::H(a) => self.h(a),
            CliffordOp::S(a) => self.s(a),
            CliffordOp::Cx(a, b) => self.cx(a, b),
            CliffordOp::Cz(a, b) => self.cz(a, b),
            CliffordOp::Measure(a, _) => self.measure(a).map(|_| ()),
        }
    }

    /// Measure the given qubit in the computational basis and record the
    /// outcome.
    ///
    /// If some stabilizer anticommutes with Z on the qubit, the outcome is an
    /// unbiased coin flip and the state collapses accordingly; otherwise the
    /// outcome is already fixed by the stabilizer group and the state is left
    /// untouched. [`StabilizerTableau::was_deterministic`] reports which
    /// branch was taken.
    pub fn measure(&mut self, qubit: usize) -> Result<bool> {
        self.check_qubit(qubit)?;
        let pivot = (self.n..2 * self.n).find(|&row| self.x_bit(row, qubit));
        let outcome = match pivot {
            Some(pivot) => self.measure_random(qubit, pivot)?,
            None => self.measure_deterministic(qubit)?,
        };
        self.deterministic[qubit] = Some(pivot.is_none());
        self.outcomes[qubit] = Some(outcome);
        Ok(outcome)
    }

    /// The recorded outcome for the given qubit, or `None` if it has not
    /// been measured. Does not force a measurement; see
    /// [`StabilizerTableau::sampling_result`] for the forcing read.
    pub fn outcome(&self, qubit: usize) -> Option<bool> {
        self.outcomes.get(qubit).copied().flatten()
    }

    /// Whether the last measurement of the given qubit took the
    /// deterministic branch, or `None` if it has not been measured.
    pub fn was_deterministic(&self, qubit: usize) -> Option<bool> {
        self.deterministic.get(qubit).copied().flatten()
    }

    /// The outcome vector in qubit-index order, measuring any qubit the
    /// circuit left unmeasured.
    pub fn sampling_result(&mut self) -> Result<Vec<bool>> {
        let mut bits = Vec::with_capacity(self.n);
        for qubit in 0..self.n {
            let bit = match self.outcomes[qubit] {
                Some(bit) => bit,
                None => self.measure(qubit)?,
            };
            bits.push(bit);
        }
        Ok(bits)
    }

    /// Collapse onto a random Z eigenstate of the qubit. The stabilizer row
    /// `pivot` is the first one whose x bit at `qubit` is set.
    fn measure_random(&mut self, qubit: usize, pivot: usize) -> Result<bool> {
        self.with_scratch_row(|tableau| {
            let n = tableau.n;
            // Multiply the pivot into every other row that anticommutes with
            // Z on the qubit, leaving the pivot as the only such row.
            for row in 0..2 * n {
                if row != pivot && tableau.x_bit(row, qubit) {
                    tableau.row_sum(row, pivot)?;
                }
            }
            // The pivot's old content becomes its destabilizer partner; the
            // pivot itself becomes Z on the qubit with a coin-flip sign.
            tableau.copy_row(pivot, pivot - n);
            tableau.clear_row(pivot);
            tableau.rows[z_block_index(n, pivot, qubit / BLOCK_SIZE)] =
                bitmask(qubit % BLOCK_SIZE);
            let outcome = tableau.rng.next_u32() & 1 == 1;
            tableau.set_sign(pivot, outcome);
            Ok(outcome)
        })
    }

    /// Read off an outcome that is already fixed by the stabilizer group.
    /// The product of the matching stabilizers is accumulated in the scratch
    /// row; its sign is the outcome. No permanent row changes.
    fn measure_deterministic(&mut self, qubit: usize) -> Result<bool> {
        self.with_scratch_row(|tableau| {
            let n = tableau.n;
            let scratch = 2 * n;
            for destab in 0..n {
                if tableau.x_bit(destab, qubit) {
                    tableau.row_sum(scratch, destab + n)?;
                }
            }
            Ok(tableau.sign(scratch))
        })
    }

    /// Run `op` with exclusive use of the scratch row. The row is zeroed on
    /// entry and again on every exit path, so its contents never outlive the
    /// call.
    fn with_scratch_row<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let scratch = 2 * self.n;
        self.clear_row(scratch);
        let result = op(self);
        self.clear_row(scratch);
        result
    }

    /// Set row `target` to be the product of the `source` and `target` rows,
    /// with the phase exponent tracked mod 4.
    ///
    /// A residue of 1 or 3 means the product carries an imaginary phase.
    /// For stabilizer and scratch targets that cannot happen on a valid
    /// tableau (commuting stabilizers multiply to a real phase) and is
    /// surfaced as an error. A destabilizer target may anticommute with the
    /// source, but destabilizer signs are never read, so the sign is left
    /// as it is.
    fn row_sum(&mut self, target: usize, source: usize) -> Result<()> {
        let n = self.n;
        let mut phase: i32 = 2 * i32::from(self.sign(target)) + 2 * i32::from(self.sign(source));
        for q in 0..n {
            phase += match (self.tensor_element(source, q), self.tensor_element(target, q)) {
                (Pauli::X, Pauli::Y) => 1,
                (Pauli::X, Pauli::Z) => -1,

                (Pauli::Y, Pauli::Z) => 1,
                (Pauli::Y, Pauli::X) => -1,

                (Pauli::Z, Pauli::X) => 1,
                (Pauli::Z, Pauli::Y) => -1,

                _ => 0,
            };
        }
        match phase.rem_euclid(4) {
            0 => self.set_sign(target, false),
            2 => self.set_sign(target, true),
            residue => {
                if target >= n {
                    return Err(SimulatorError::InconsistentPhase {
                        residue: residue as u8,
                    });
                }
            }
        }

        // The Pauli content of the product is the XOR of the two rows.
        for i in 0..2 * n.div_ceil(BLOCK_SIZE) {
            self.rows[row_block_index(n, target, i)] ^= self.rows[row_block_index(n, source, i)];
        }
        Ok(())
    }

    fn check_qubit(&self, qubit: usize) -> Result<()> {
        if qubit < self.n {
            Ok(())
        } else {
            Err(SimulatorError::InvalidQubitIndex {
                qubit,
                qubits: self.n,
            })
        }
    }

    fn clear_row(&mut self, row: usize) {
        let n = self.n;
        for i in 0..row_block_length(n) {
            self.rows[row_block_index(n, row, i)] = 0;
        }
    }

    fn copy_row(&mut self, source: usize, target: usize) {
        let n = self.n;
        for i in 0..row_block_length(n) {
            self.rows[row_block_index(n, target, i)] = self.rows[row_block_index(n, source, i)];
        }
    }

    /// Get the Pauli matrix corresponding to the `q`th tensor element in the
    /// given row.
    fn tensor_element(&self, row: usize, q: usize) -> Pauli {
        match (self.x_bit(row, q), self.z_bit(row, q)) {
            (false, false) => Pauli::I,
            (true, false) => Pauli::X,
            (true, true) => Pauli::Y,
            (false, true) => Pauli::Z,
        }
    }

    fn x_bit(&self, row: usize, q: usize) -> bool {
        self.rows[x_block_index(self.n, row, q / BLOCK_SIZE)] & bitmask(q % BLOCK_SIZE) != 0
    }

    fn z_bit(&self, row: usize, q: usize) -> bool {
        self.rows[z_block_index(self.n, row, q / BLOCK_SIZE)] & bitmask(q % BLOCK_SIZE) != 0
    }

    /// Get whether the given row is negative, i.e. the contents of the sign
    /// bit.
    fn sign(&self, row: usize) -> bool {
        self.rows[r_block_index(self.n, row)] != 0
    }

    fn set_sign(&mut self, row: usize, negative: bool) {
        let block = r_block_index(self.n, row);
        self.rows[block] = if negative { bitmask(0) } else { 0 };
    }
}

impl fmt::Debug for StabilizerTableau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..2 * self.n {
            if row == self.n {
                writeln!(f, "---")?;
            }
            write!(f, "{}", if self.sign(row) { '-' } else { '+' })?;
            for q in 0..self.n {
                write!(f, "{:?}", self.tensor_element(row, q))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Get the bitmask for the i'th bit, e.g.
///
/// ```text
/// bitmask(0) -> 10000000
/// bitmask(1) -> 01000000
/// bitmask(6) -> 00000010
/// ```
///
/// # Panics
/// If `i` is greater than or equal to `BLOCK_SIZE` in debug mode.
fn bitmask(i: usize) -> BitBlock {
    debug_assert!(i < BLOCK_SIZE);
    1 << (BLOCK_SIZE - 1 - i)
}

/// Get the index of the i'th block of the given row.
fn row_block_index(n: usize, row: usize, i: usize) -> usize {
    debug_assert!(row < 2 * n + 1);
    debug_assert!(i < row_block_length(n));
    row * row_block_length(n) + i
}
/// Get the index of the i'th block of the x part of the given row.
fn x_block_index(n: usize, row: usize, i: usize) -> usize {
    debug_assert!(i < n.div_ceil(BLOCK_SIZE));
    row_block_index(n, row, i)
}
/// Get the index of the i'th block of the z part of the given row.
fn z_block_index(n: usize, row: usize, i: usize) -> usize {
    debug_assert!(i < n.div_ceil(BLOCK_SIZE));
    row_block_index(n, row, n.div_ceil(BLOCK_SIZE) + i)
}
/// Get the index of the block containing the sign bit of the given row.
fn r_block_index(n: usize, row: usize) -> usize {
    row_block_index(n, row, 2 * n.div_ceil(BLOCK_SIZE))
}

/// Get the block-length of the rows in the tableau.
fn row_block_length(n: usize) -> usize {
    2 * n.div_ceil(BLOCK_SIZE) + 1
}
/// Get the block-length of the tableau, including the scratch row.
fn tableau_block_length(n: usize) -> usize {
    row_block_length(n) * (2 * n + 1)
}

/// Bit-shift the given block such that the `from`th bit is moved to the
/// `to`th position.
fn align_bit_to(block: BitBlock, from: usize, to: usize) -> BitBlock {
    if to < from {
        block << (from - to)
    } else {
        block >> (to - from)
    }
}
