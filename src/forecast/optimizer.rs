/// Derivative-free simplex minimizer used to fit smoothing parameters.
#[derive(Debug, Clone)]
pub struct NelderMead {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 800,
            tolerance: 1e-10,
            initial_step: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl NelderMead {
    /// Minimizes `objective` starting from `start`. Non-finite objective values are
    /// treated as +inf so the simplex walks away from them.
    pub fn minimize<F>(&self, objective: F, start: &[f64]) -> Minimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let dim = start.len();
        let eval = |point: &[f64]| {
            let value = objective(point);
            if value.is_finite() {
                value
            } else {
                f64::INFINITY
            }
        };

        if dim == 0 {
            return Minimum {
                point: Vec::new(),
                value: eval(start),
                iterations: 0,
                converged: true,
            };
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
        simplex.push((start.to_vec(), eval(start)));
        for axis in 0..dim {
            let mut vertex = start.to_vec();
            vertex[axis] += self.initial_step;
            let value = eval(&vertex);
            simplex.push((vertex, value));
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let best = simplex[0].1;
            let worst = simplex[dim].1;
            if (worst - best).abs() <= self.tolerance * (1.0 + best.abs()) {
                converged = true;
                break;
            }
            iterations += 1;

            let centroid: Vec<f64> = (0..dim)
                .map(|axis| simplex[..dim].iter().map(|(p, _)| p[axis]).sum::<f64>() / dim as f64)
                .collect();
            let worst_point = simplex[dim].0.clone();
            let along = |coefficient: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&worst_point)
                    .map(|(c, w)| c + coefficient * (c - w))
                    .collect()
            };

            let reflected = along(1.0);
            let reflected_value = eval(&reflected);

            if reflected_value < best {
                let expanded = along(2.0);
                let expanded_value = eval(&expanded);
                simplex[dim] = if expanded_value < reflected_value {
                    (expanded, expanded_value)
                } else {
                    (reflected, reflected_value)
                };
                continue;
            }

            if reflected_value < simplex[dim - 1].1 {
                simplex[dim] = (reflected, reflected_value);
                continue;
            }

            let coefficient = if reflected_value < worst { 0.5 } else { -0.5 };
            let contracted = along(coefficient);
            let contracted_value = eval(&contracted);
            if contracted_value < reflected_value.min(worst) {
                simplex[dim] = (contracted, contracted_value);
                continue;
            }

            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(&vertex.0)
                    .map(|(a, v)| a + 0.5 * (v - a))
                    .collect();
                let value = eval(&shrunk);
                *vertex = (shrunk, value);
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (point, value) = simplex.swap_remove(0);
        Minimum {
            point,
            value,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_minimum_of_shifted_quadratic() {
        let objective = |p: &[f64]| (p[0] - 1.5).powi(2) + 2.0 * (p[1] + 0.5).powi(2);
        let minimum = NelderMead::default().minimize(objective, &[0.0, 0.0]);
        assert!(minimum.converged);
        assert!((minimum.point[0] - 1.5).abs() < 1e-3);
        assert!((minimum.point[1] + 0.5).abs() < 1e-3);
        assert!(minimum.value < 1e-6);
    }

    #[test]
    fn steps_away_from_non_finite_regions() {
        let objective = |p: &[f64]| if p[0] < 0.0 { f64::NAN } else { (p[0] - 2.0).powi(2) };
        let minimum = NelderMead::default().minimize(objective, &[1.0]);
        assert!(minimum.value.is_finite());
        assert!((minimum.point[0] - 2.0).abs() < 1e-3);
    }
}
