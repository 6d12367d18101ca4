use ndarray::{Array1, Array2};

/// Dense Newton system: the KCL residual `F(V)` and its Jacobian `J = dF/dV`.
///
/// Row `i` is the KCL equation of node `i` (sum of branch currents leaving the
/// node). Ground has no row; stamps addressed to `None` are dropped.
#[derive(Debug, Clone)]
pub(crate) struct SystemMatrix {
    jacobian: Array2<f64>,
    residual: Array1<f64>,
    /// Sum of |branch current| seen by each node, scale for the relative current tolerance.
    current_scale: Array1<f64>,
}

impl SystemMatrix {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            jacobian: Array2::zeros((n, n)),
            residual: Array1::zeros(n),
            current_scale: Array1::zeros(n),
        }
    }

    pub(crate) fn dim(&self) -> usize {
        self.residual.len()
    }

    pub(crate) fn clear(&mut self) {
        self.jacobian.fill(0.0);
        self.residual.fill(0.0);
        self.current_scale.fill(0.0);
    }

    /// Stamp a branch current `i` flowing out of `head` and into `tail`.
    pub(crate) fn stamp_current(&mut self, head: Option<usize>, tail: Option<usize>, i: f64) {
        if let Some(head) = head {
            self.residual[head] += i;
            self.current_scale[head] += i.abs();
        }
        if let Some(tail) = tail {
            self.residual[tail] -= i;
            self.current_scale[tail] += i.abs();
        }
    }

    /// Stamp `di/dv` for a control voltage `v = V(plus) - V(minus)` of a branch
    /// between `head` and `tail`.
    pub(crate) fn stamp_partial(
        &mut self,
        head: Option<usize>,
        tail: Option<usize>,
        plus: Option<usize>,
        minus: Option<usize>,
        g: f64,
    ) {
        for (row, sign) in [(head, 1.0), (tail, -1.0)] {
            let Some(row) = row else { continue };
            if let Some(plus) = plus {
                self.jacobian[[row, plus]] += sign * g;
            }
            if let Some(minus) = minus {
                self.jacobian[[row, minus]] -= sign * g;
            }
        }
    }

    /// Conductance from every node to ground.
    pub(crate) fn stamp_gmin(&mut self, gmin: f64, voltages: &[f64]) {
        for (i, v) in voltages.iter().enumerate() {
            self.jacobian[[i, i]] += gmin;
            self.residual[i] += gmin * v;
        }
    }

    pub(crate) fn jacobian(&self) -> &Array2<f64> {
        &self.jacobian
    }

    pub(crate) fn residual(&self) -> &Array1<f64> {
        &self.residual
    }

    pub(crate) fn current_scale(&self) -> &Array1<f64> {
        &self.current_scale
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.residual.iter().all(|x| x.is_finite()) && self.jacobian.iter().all(|x| x.is_finite())
    }

    pub(crate) fn residual_norm(&self) -> f64 {
        self.residual.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_terminal_conductance_stamp() {
        // 1 mS between node 0 and node 1, controlled by the voltage across itself.
        let mut m = SystemMatrix::new(2);
        m.stamp_current(Some(0), Some(1), 2e-3);
        m.stamp_partial(Some(0), Some(1), Some(0), Some(1), 1e-3);

        assert_eq!(m.residual().to_vec(), vec![2e-3, -2e-3]);
        assert_eq!(
            m.jacobian().iter().copied().collect::<Vec<_>>(),
            vec![1e-3, -1e-3, -1e-3, 1e-3]
        );
        assert_eq!(m.current_scale().to_vec(), vec![2e-3, 2e-3]);
    }

    #[test]
    fn test_ground_stamps_are_dropped() {
        let mut m = SystemMatrix::new(1);
        m.stamp_current(None, Some(0), 1.0);
        m.stamp_partial(None, Some(0), None, Some(0), 0.5);
        assert_eq!(m.residual()[0], -1.0);
        // row 0 sign -1, minus column 0 -> -(-1 * 0.5)
        assert_eq!(m.jacobian()[[0, 0]], 0.5);
    }
}
