use std::collections::HashMap;
use std::f64::consts::FRAC_1_SQRT_2;

use num_complex::Complex64;
use qstab::{
    sample, sample_circuit, CliffordCircuit,
    CliffordOp::{self, *},
    SimulatorError, StabilizerTableau,
};

#[test]
fn bell_pair_outcomes_are_perfectly_correlated() {
    let circuit = CliffordCircuit::new(
        2,
        [H(0), Cx(0, 1), Measure(0, 0), Measure(1, 1)],
    )
    .unwrap();

    let frequencies = sample_circuit(&circuit, 8192, 7).unwrap();

    let mut total = 0.0;
    for (key, &frequency) in &frequencies {
        assert!(key == "00" || key == "11", "uncorrelated outcome {key}");
        assert!((frequency - 0.5).abs() < 0.05, "outcome {key}: {frequency}");
        total += frequency;
    }
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn ghz_outcomes_are_all_zero_or_all_one() {
    for k in [1usize, 2, 5] {
        let qubits = k + 1;
        let mut ops = vec![H(0)];
        for i in 0..k {
            ops.push(Cx(i, i + 1));
        }
        for q in 0..qubits {
            ops.push(Measure(q, q));
        }
        let circuit = CliffordCircuit::new(qubits, ops).unwrap();

        let frequencies = sample_circuit(&circuit, 4096, 17).unwrap();

        let zeros = "0".repeat(qubits);
        let ones = "1".repeat(qubits);
        for (key, &frequency) in &frequencies {
            assert!(key == &zeros || key == &ones, "k={k}: outcome {key}");
            assert!((frequency - 0.5).abs() < 0.05, "k={k}: outcome {key}: {frequency}");
        }
    }
}

#[test]
fn a_wide_ghz_chain_stays_correlated() {
    let qubits = 100;
    let mut ops = vec![H(0)];
    for i in 0..qubits - 1 {
        ops.push(Cx(i, i + 1));
    }
    for q in 0..qubits {
        ops.push(Measure(q, q));
    }
    let circuit = CliffordCircuit::new(qubits, ops).unwrap();

    let frequencies = sample_circuit(&circuit, 256, 41).unwrap();

    let zeros = "0".repeat(qubits);
    let ones = "1".repeat(qubits);
    assert_eq!(frequencies.len(), 2);
    for key in frequencies.keys() {
        assert!(key == &zeros || key == &ones);
    }
}

#[test]
fn an_empty_circuit_always_samples_zero() {
    let circuit = CliffordCircuit::new(3, []).unwrap();

    let frequencies = sample_circuit(&circuit, 256, 3).unwrap();

    assert_eq!(frequencies.len(), 1);
    assert!((frequencies["000"] - 1.0).abs() < 1e-12);
}

#[test]
fn unmeasured_qubits_are_forced_at_the_end() {
    // The same Bell pair, but the circuit never measures; the driver has to.
    let circuit = CliffordCircuit::new(2, [H(0), Cx(0, 1)]).unwrap();

    let frequencies = sample_circuit(&circuit, 4096, 29).unwrap();

    for key in frequencies.keys() {
        assert!(key == "00" || key == "11", "uncorrelated outcome {key}");
    }
}

#[test]
fn circuit_functions_drive_the_tableau_directly() {
    let frequencies = sample(2, 4096, 9, |tableau| {
        tableau.h(0)?;
        tableau.cx(0, 1)?;
        tableau.measure(0)?;
        tableau.measure(1)?;
        Ok(())
    })
    .unwrap();

    for key in frequencies.keys() {
        assert!(key == "00" || key == "11", "uncorrelated outcome {key}");
    }
}

#[test]
fn remeasurement_is_deterministic_and_stable() {
    let mut tableau = StabilizerTableau::with_seed(2, 21).unwrap();
    tableau.h(0).unwrap();
    tableau.cx(0, 1).unwrap();

    let first = tableau.measure(0).unwrap();
    assert_eq!(tableau.was_deterministic(0), Some(false));

    // The collapsed qubit and its entangled partner are both fixed now.
    assert_eq!(tableau.measure(0).unwrap(), first);
    assert_eq!(tableau.was_deterministic(0), Some(true));
    assert_eq!(tableau.measure(1).unwrap(), first);
    assert_eq!(tableau.was_deterministic(1), Some(true));
}

#[test]
fn sampling_is_reproducible_for_a_fixed_seed() {
    let circuit = CliffordCircuit::new(2, [H(0), Cx(0, 1)]).unwrap();

    let first = sample_circuit(&circuit, 2048, 123).unwrap();
    let second = sample_circuit(&circuit, 2048, 123).unwrap();

    assert_eq!(first, second);
}

#[test]
fn example_circuit_matches_the_dense_reference() {
    let circuit = example_circuit();

    let frequencies = sample_circuit(&circuit, 20_000, 123).unwrap();
    let reference = reference_distribution(&circuit);

    compare_distributions(&frequencies, &reference, 0.03);
}

#[test]
fn random_clifford_circuits_match_the_dense_reference() {
    for seed in [1u64, 2, 3] {
        let circuit = CliffordCircuit::random(4, 60, seed);

        let frequencies = sample_circuit(&circuit, 20_000, seed).unwrap();
        let reference = reference_distribution(&circuit);

        compare_distributions(&frequencies, &reference, 0.03);
    }
}

#[test]
fn invalid_circuits_are_rejected_up_front() {
    assert_eq!(
        CliffordCircuit::new(3, [Cx(0, 3)]).unwrap_err(),
        SimulatorError::InvalidQubitIndex { qubit: 3, qubits: 3 }
    );
    assert_eq!(
        CliffordCircuit::new(3, [Cz(2, 2)]).unwrap_err(),
        SimulatorError::DuplicateQubit(2)
    );

    let circuit = CliffordCircuit::new(2, [H(0)]).unwrap();
    assert_eq!(
        sample_circuit(&circuit, 0, 0).unwrap_err(),
        SimulatorError::NoShots
    );
}

/// A 3-qubit circuit interleaving measurements with further gates, so that
/// later gates act on an already collapsed state.
fn example_circuit() -> CliffordCircuit {
    CliffordCircuit::new(
        3,
        [
            H(1),
            H(2),
            Cz(0, 1),
            Cz(1, 2),
            H(0),
            Measure(0, 0),
            Cx(0, 1),
            S(1),
            Cx(0, 1),
            H(1),
            Measure(1, 1),
            H(2),
            Cz(1, 2),
            H(2),
            Cz(0, 2),
            Measure(2, 2),
        ],
    )
    .unwrap()
}

fn compare_distributions(
    observed: &HashMap<String, f64>,
    expected: &HashMap<String, f64>,
    tolerance: f64,
) {
    for (key, &probability) in expected {
        let frequency = observed.get(key).copied().unwrap_or(0.0);
        assert!(
            (frequency - probability).abs() < tolerance,
            "outcome {key}: observed {frequency}, expected {probability}"
        );
    }
    for key in observed.keys() {
        assert!(
            expected.contains_key(key),
            "outcome {key} has probability zero"
        );
    }
}

/// Compute the exact outcome distribution of a circuit with a dense
/// statevector, following both branches of every measurement. Qubit `q` is
/// bit `q` of the basis-state index; keys use the same qubit-index-ordered
/// convention as the sampler.
fn reference_distribution(circuit: &CliffordCircuit) -> HashMap<String, f64> {
    let qubits = circuit.qubits();
    let mut amps = vec![Complex64::new(0.0, 0.0); 1 << qubits];
    amps[0] = Complex64::new(1.0, 0.0);
    let mut dist = HashMap::new();
    let mut outcomes = vec![None; qubits];
    walk(qubits, circuit.ops(), amps, 1.0, &mut outcomes, &mut dist);
    dist
}

fn walk(
    qubits: usize,
    ops: &[CliffordOp],
    mut amps: Vec<Complex64>,
    weight: f64,
    outcomes: &mut Vec<Option<bool>>,
    dist: &mut HashMap<String, f64>,
) {
    for (index, &op) in ops.iter().enumerate() {
        if let CliffordOp::Measure(q, _) = op {
            let p_one = probability_one(&amps, q);
            for bit in [false, true] {
                let p = if bit { p_one } else { 1.0 - p_one };
                if p < 1e-12 {
                    continue;
                }
                let saved = outcomes[q];
                outcomes[q] = Some(bit);
                let projected = project(&amps, q, bit, p);
                walk(qubits, &ops[index + 1..], projected, weight * p, outcomes, dist);
                outcomes[q] = saved;
            }
            return;
        }
        apply_dense(&mut amps, op);
    }

    // End of the circuit: any qubit still unmeasured is read off the basis
    // state itself, mirroring the sampler's forced measurement.
    for (basis, amp) in amps.iter().enumerate() {
        let p = amp.norm_sqr();
        if p < 1e-12 {
            continue;
        }
        let key: String = (0..qubits)
            .map(|q| {
                let bit = outcomes[q].unwrap_or((basis >> q) & 1 == 1);
                if bit {
                    '1'
                } else {
                    '0'
                }
            })
            .collect();
        *dist.entry(key).or_insert(0.0) += weight * p;
    }
}

fn apply_dense(amps: &mut [Complex64], op: CliffordOp) {
    let i = Complex64::new(0.0, 1.0);
    match op {
        X(q) => for_pairs(amps, q, |a0, a1| (a1, a0)),
        Y(q) => for_pairs(amps, q, |a0, a1| (-i * a1, i * a0)),
        Z(q) => for_pairs(amps, q, |a0, a1| (a0, -a1)),
        H(q) => for_pairs(amps, q, |a0, a1| {
            (FRAC_1_SQRT_2 * (a0 + a1), FRAC_1_SQRT_2 * (a0 - a1))
        }),
        S(q) => for_pairs(amps, q, |a0, a1| (a0, i * a1)),
        Cx(c, t) => {
            let c_mask = 1usize << c;
            let t_mask = 1usize << t;
            for basis in 0..amps.len() {
                if basis & c_mask != 0 && basis & t_mask == 0 {
                    amps.swap(basis, basis | t_mask);
                }
            }
        }
        Cz(c, t) => {
            let mask = (1usize << c) | (1usize << t);
            for (basis, amp) in amps.iter_mut().enumerate() {
                if basis & mask == mask {
                    *amp = -*amp;
                }
            }
        }
        Measure(..) => unreachable!("measurements are branched in walk"),
    }
}

fn for_pairs(
    amps: &mut [Complex64],
    q: usize,
    f: impl Fn(Complex64, Complex64) -> (Complex64, Complex64),
) {
    let mask = 1usize << q;
    for basis in 0..amps.len() {
        if basis & mask == 0 {
            let (a0, a1) = f(amps[basis], amps[basis | mask]);
            amps[basis] = a0;
            amps[basis | mask] = a1;
        }
    }
}

fn probability_one(amps: &[Complex64], q: usize) -> f64 {
    let mask = 1usize << q;
    amps.iter()
        .enumerate()
        .filter(|&(basis, _)| basis & mask != 0)
        .map(|(_, amp)| amp.norm_sqr())
        .sum()
}

fn project(amps: &[Complex64], q: usize, bit: bool, p: f64) -> Vec<Complex64> {
    let mask = 1usize << q;
    let norm = p.sqrt();
    amps.iter()
        .enumerate()
        .map(|(basis, &amp)| {
            if (basis & mask != 0) == bit {
                amp / norm
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
        .collect()
}
