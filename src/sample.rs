use std::cmp::min;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex,
};

use crate::clifford_circuit::CliffordCircuit;
use crate::error::{Result, SimulatorError};
use crate::tableau::StabilizerTableau;

/// Run `circuit_fn` against a fresh tableau for each of `shots` independent
/// trials and aggregate the outcome bitstrings into relative frequencies.
///
/// The returned map has one key per observed outcome, one character per
/// qubit with qubit 0 first, and its values sum to 1 up to floating
/// rounding.
///
/// Shots are distributed over a pool of worker threads, each tallying into
/// a local map that is merged under a single lock at the end. Shot `k`
/// always derives its randomness from `seed` and `k` alone, so the result
/// is reproducible for a fixed `seed` no matter how the shots are
/// scheduled.
pub fn sample<F>(
    qubits: usize,
    shots: u64,
    seed: u64,
    circuit_fn: F,
) -> Result<HashMap<String, f64>>
where
    F: Fn(&mut StabilizerTableau) -> Result<()> + Sync,
{
    if shots == 0 {
        return Err(SimulatorError::NoShots);
    }

    let threads = min(num_cpus::get() as u64, shots);
    let next_shot = AtomicU64::new(0);
    let done = AtomicBool::new(false);
    let counts: Mutex<HashMap<String, u64>> = Mutex::new(HashMap::new());
    let failure: Mutex<Option<SimulatorError>> = Mutex::new(None);

    rayon::in_place_scope(|s| {
        for _ in 0..threads {
            s.spawn(|_| {
                let mut local: HashMap<String, u64> = HashMap::new();
                loop {
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                    let shot = next_shot.fetch_add(1, Ordering::SeqCst);
                    if shot >= shots {
                        break;
                    }
                    match run_shot(qubits, shot_seed(seed, shot), &circuit_fn) {
                        Ok(key) => *local.entry(key).or_insert(0) += 1,
                        Err(error) => {
                            *failure.lock().unwrap() = Some(error);
                            done.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                }

                let mut counts = counts.lock().unwrap();
                for (key, count) in local {
                    *counts.entry(key).or_insert(0) += count;
                }
            });
        }
    });

    if let Some(error) = failure.into_inner().unwrap() {
        return Err(error);
    }
    Ok(counts
        .into_inner()
        .unwrap()
        .into_iter()
        .map(|(key, count)| (key, count as f64 / shots as f64))
        .collect())
}

/// Run the recorded operations of `circuit` for `shots` independent trials.
/// See [`sample`] for the shape of the result.
pub fn sample_circuit(
    circuit: &CliffordCircuit,
    shots: u64,
    seed: u64,
) -> Result<HashMap<String, f64>> {
    sample(circuit.qubits(), shots, seed, |tableau| {
        for &op in circuit.ops() {
            tableau.apply(op)?;
        }
        Ok(())
    })
}

/// Render an outcome vector as one character per qubit, qubit 0 first.
pub fn bitstring(bits: &[bool]) -> String {
    bits.iter().map(|&bit| if bit { '1' } else { '0' }).collect()
}

fn run_shot<F>(qubits: usize, seed: u64, circuit_fn: &F) -> Result<String>
where
    F: Fn(&mut StabilizerTableau) -> Result<()>,
{
    let mut tableau = StabilizerTableau::with_seed(qubits, seed)?;
    circuit_fn(&mut tableau)?;
    let bits = tableau.sampling_result()?;
    Ok(bitstring(&bits))
}

/// Spread consecutive shot indices across distinct randomness streams.
fn shot_seed(seed: u64, shot: u64) -> u64 {
    seed ^ shot.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
