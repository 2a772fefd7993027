use ember_ml_core::{MlError, MlResult, Tensor};

fn check_learning_rate(lr: f64) -> MlResult<()> {
    if lr <= 0.0 {
        return Err(MlError::InvalidConfiguration(format!(
            "learning rate must be positive, got {}",
            lr
        )));
    }
    Ok(())
}

/// Stochastic gradient descent with momentum.
///
/// v ← μ·v − lr·g, p ← p + v
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    velocities: Vec<Tensor<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64) -> MlResult<Self> {
        check_learning_rate(learning_rate)?;
        if !(0.0..1.0).contains(&momentum) {
            return Err(MlError::InvalidConfiguration(format!(
                "momentum must lie in [0, 1), got {}",
                momentum
            )));
        }
        Ok(Sgd {
            learning_rate,
            momentum,
            velocities: Vec::new(),
        })
    }

    fn step(&mut self, params: Vec<(&mut Tensor<f64>, &Tensor<f64>)>) -> MlResult<()> {
        if self.velocities.len() != params.len() {
            self.velocities = params
                .iter()
                .map(|(p, _)| Tensor::zeros(p.shape_vec()))
                .collect();
        }
        for (i, (param, grad)) in params.into_iter().enumerate() {
            let v = self.velocities[i]
                .mul_scalar(self.momentum)
                .sub(&grad.mul_scalar(self.learning_rate))?;
            *param = param.add(&v)?;
            self.velocities[i] = v;
        }
        Ok(())
    }
}

/// Adam: per-parameter learning rates from bias-corrected first and second
/// gradient moments.
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: usize,
    m: Vec<Tensor<f64>>,
    v: Vec<Tensor<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> MlResult<Self> {
        check_learning_rate(learning_rate)?;
        Ok(Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        })
    }

    fn step(&mut self, params: Vec<(&mut Tensor<f64>, &Tensor<f64>)>) -> MlResult<()> {
        if self.m.len() != params.len() {
            self.m = params
                .iter()
                .map(|(p, _)| Tensor::zeros(p.shape_vec()))
                .collect();
            self.v = params
                .iter()
                .map(|(p, _)| Tensor::zeros(p.shape_vec()))
                .collect();
            self.t = 0;
        }
        self.t += 1;
        let correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, (param, grad)) in params.into_iter().enumerate() {
            self.m[i] = self.m[i]
                .mul_scalar(self.beta1)
                .add(&grad.mul_scalar(1.0 - self.beta1))?;
            let grad_sq = grad.mul(grad)?;
            self.v[i] = self.v[i]
                .mul_scalar(self.beta2)
                .add(&grad_sq.mul_scalar(1.0 - self.beta2))?;

            let m_hat = self.m[i].mul_scalar(1.0 / correction1);
            let v_hat = self.v[i].mul_scalar(1.0 / correction2);
            let denom = v_hat.sqrt().add_scalar(self.epsilon);
            let update = m_hat.div(&denom)?.mul_scalar(self.learning_rate);
            *param = param.sub(&update)?;
        }
        Ok(())
    }
}

/// The optimizer choices accepted by `Network::compile`.
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    pub fn sgd(learning_rate: f64, momentum: f64) -> MlResult<Self> {
        Ok(Optimizer::Sgd(Sgd::new(learning_rate, momentum)?))
    }

    pub fn adam(learning_rate: f64) -> MlResult<Self> {
        Ok(Optimizer::Adam(Adam::new(learning_rate)?))
    }

    /// Apply one update to every `(parameter, gradient)` pair. Pairs must
    /// arrive in a stable order so moment state stays aligned.
    pub fn step(&mut self, params: Vec<(&mut Tensor<f64>, &Tensor<f64>)>) -> MlResult<()> {
        match self {
            Optimizer::Sgd(sgd) => sgd.step(params),
            Optimizer::Adam(adam) => adam.step(params),
        }
    }
}
