//! Minimal statevector simulator for the quantum sampling path.
//!
//! Four qubits, dense complex amplitudes, qubit 0 as the least-significant
//! bit of the basis index. Only the gates the noise circuit needs are
//! implemented (ry, rz, h, cx).

/// Complex amplitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amp {
    pub re: f64,
    pub im: f64,
}

impl Amp {
    const ZERO: Self = Self { re: 0.0, im: 0.0 };
    const ONE: Self = Self { re: 1.0, im: 0.0 };

    fn mul(self, other: Self) -> Self {
        Self {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    fn scale(self, s: f64) -> Self {
        Self {
            re: self.re * s,
            im: self.im * s,
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            re: self.re + other.re,
            im: self.im + other.im,
        }
    }

    fn sub(self, other: Self) -> Self {
        Self {
            re: self.re - other.re,
            im: self.im - other.im,
        }
    }

    fn norm_sq(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

/// Number of qubits in the noise circuit.
pub const NUM_QUBITS: usize = 4;

/// Number of measurement outcomes.
pub const NUM_OUTCOMES: usize = 1 << NUM_QUBITS;

/// Dense 4-qubit statevector, initialized to |0000⟩.
#[derive(Debug, Clone)]
pub struct StateVector {
    amps: [Amp; NUM_OUTCOMES],
}

impl Default for StateVector {
    fn default() -> Self {
        Self::new()
    }
}

impl StateVector {
    /// The |0000⟩ state.
    #[must_use]
    pub fn new() -> Self {
        let mut amps = [Amp::ZERO; NUM_OUTCOMES];
        amps[0] = Amp::ONE;
        Self { amps }
    }

    /// Apply a single-qubit gate given by its 2x2 matrix.
    fn apply_1q(&mut self, q: usize, m: [[Amp; 2]; 2]) {
        let mask = 1 << q;
        for i in 0..NUM_OUTCOMES {
            if i & mask == 0 {
                let j = i | mask;
                let a0 = self.amps[i];
                let a1 = self.amps[j];
                self.amps[i] = m[0][0].mul(a0).add(m[0][1].mul(a1));
                self.amps[j] = m[1][0].mul(a0).add(m[1][1].mul(a1));
            }
        }
    }

    /// Rotation about Y by `theta` on qubit `q`.
    pub fn ry(&mut self, theta: f64, q: usize) {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let m = [
            [Amp { re: c, im: 0.0 }, Amp { re: -s, im: 0.0 }],
            [Amp { re: s, im: 0.0 }, Amp { re: c, im: 0.0 }],
        ];
        self.apply_1q(q, m);
    }

    /// Rotation about Z by `theta` on qubit `q`.
    pub fn rz(&mut self, theta: f64, q: usize) {
        let half = theta / 2.0;
        let m = [
            [
                Amp {
                    re: half.cos(),
                    im: -half.sin(),
                },
                Amp::ZERO,
            ],
            [
                Amp::ZERO,
                Amp {
                    re: half.cos(),
                    im: half.sin(),
                },
            ],
        ];
        self.apply_1q(q, m);
    }

    /// Hadamard on qubit `q`.
    pub fn h(&mut self, q: usize) {
        let inv_sqrt2 = std::f64::consts::FRAC_1_SQRT_2;
        let mask = 1 << q;
        for i in 0..NUM_OUTCOMES {
            if i & mask == 0 {
                let j = i | mask;
                let a0 = self.amps[i];
                let a1 = self.amps[j];
                self.amps[i] = a0.add(a1).scale(inv_sqrt2);
                self.amps[j] = a0.sub(a1).scale(inv_sqrt2);
            }
        }
    }

    /// Controlled-NOT with control `c` and target `t`.
    pub fn cx(&mut self, c: usize, t: usize) {
        let cmask = 1 << c;
        let tmask = 1 << t;
        for i in 0..NUM_OUTCOMES {
            if i & cmask != 0 && i & tmask == 0 {
                let j = i | tmask;
                self.amps.swap(i, j);
            }
        }
    }

    /// Measurement probability for each basis outcome.
    #[must_use]
    pub fn probabilities(&self) -> [f64; NUM_OUTCOMES] {
        let mut p = [0.0; NUM_OUTCOMES];
        for (i, amp) in self.amps.iter().enumerate() {
            p[i] = amp.norm_sq();
        }
        p
    }
}

/// Build and evaluate the state-dependent noise circuit, returning the
/// outcome probability distribution.
///
/// The layout entangles a state-encoding qubit with a velocity-encoding
/// qubit, spreads correlation down the register, applies a phase driven by
/// the action, and mixes the top qubit.
#[must_use]
pub fn noise_circuit_probabilities(
    state_value: f64,
    velocity: f64,
    action_sum: f64,
) -> [f64; NUM_OUTCOMES] {
    let mut sv = StateVector::new();
    let quarter_pi = std::f64::consts::FRAC_PI_4;
    sv.ry(state_value * quarter_pi, 0);
    sv.ry(velocity * quarter_pi, 1);
    sv.cx(0, 1);
    sv.cx(1, 2);
    sv.rz(action_sum, 2);
    sv.cx(2, 3);
    sv.h(3);
    sv.probabilities()
}
