use ember_ml_core::{rng_from_seed, MlError, MlResult, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

/// Elementwise activation functions. Softmax acts row-wise and therefore
/// requires a `[batch, classes]` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    pub fn name(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }

    pub fn from_name(name: &str) -> MlResult<Self> {
        match name {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            other => Err(MlError::InvalidConfiguration(format!(
                "unknown activation {:?}",
                other
            ))),
        }
    }

    pub fn apply(&self, z: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        match self {
            Activation::Linear => Ok(z.clone()),
            Activation::Relu => Ok(z.apply(|v| v.max(0.0))),
            Activation::Sigmoid => Ok(z.apply(|v| 1.0 / (1.0 + (-v).exp()))),
            Activation::Tanh => Ok(z.apply(f64::tanh)),
            Activation::Softmax => {
                let (rows, cols) = rank2(z)?;
                let mut data = z.data().to_vec();
                for r in 0..rows {
                    let row = &mut data[r * cols..(r + 1) * cols];
                    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let mut sum = 0.0;
                    for v in row.iter_mut() {
                        *v = (*v - max).exp();
                        sum += *v;
                    }
                    for v in row.iter_mut() {
                        *v /= sum;
                    }
                }
                Tensor::new(data, z.shape_vec())
            }
        }
    }

    /// Chain the activation derivative: dL/dz from dL/da and the cached
    /// activation output `a`.
    pub fn backward(&self, grad_out: &Tensor<f64>, output: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        match self {
            Activation::Linear => Ok(grad_out.clone()),
            Activation::Relu => {
                let mask = output.apply(|a| if a > 0.0 { 1.0 } else { 0.0 });
                grad_out.mul(&mask)
            }
            Activation::Sigmoid => {
                let deriv = output.apply(|a| a * (1.0 - a));
                grad_out.mul(&deriv)
            }
            Activation::Tanh => {
                let deriv = output.apply(|a| 1.0 - a * a);
                grad_out.mul(&deriv)
            }
            Activation::Softmax => {
                // Row-wise Jacobian product: dz_i = a_i (g_i − Σ_j g_j a_j).
                let (rows, cols) = rank2(output)?;
                if output.shape() != grad_out.shape() {
                    return Err(MlError::ShapeMismatch {
                        expected: output.shape_vec(),
                        got: grad_out.shape_vec(),
                    });
                }
                let a = output.data();
                let g = grad_out.data();
                let mut data = vec![0.0; rows * cols];
                for r in 0..rows {
                    let base = r * cols;
                    let dot: f64 = (0..cols).map(|c| g[base + c] * a[base + c]).sum();
                    for c in 0..cols {
                        data[base + c] = a[base + c] * (g[base + c] - dot);
                    }
                }
                Tensor::new(data, output.shape_vec())
            }
        }
    }
}

fn rank2(t: &Tensor<f64>) -> MlResult<(usize, usize)> {
    if t.ndim() != 2 {
        return Err(MlError::DimensionMismatch(format!(
            "expected a [batch, features] tensor, got rank {}",
            t.ndim()
        )));
    }
    Ok((t.shape().dim(0)?, t.shape().dim(1)?))
}

/// `x` is [n, d], `v` is [d]; applies `op` down every row. The tensor core
/// has no implicit broadcasting, so row-wise combination is spelled out here.
fn rowwise(
    x: &Tensor<f64>,
    v: &Tensor<f64>,
    op: impl Fn(f64, f64) -> f64,
) -> MlResult<Tensor<f64>> {
    let (rows, cols) = rank2(x)?;
    if v.ndim() != 1 || v.numel() != cols {
        return Err(MlError::ShapeMismatch {
            expected: vec![cols],
            got: v.shape_vec(),
        });
    }
    let mut data = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            data.push(op(x.data()[r * cols + c], v.data()[c]));
        }
    }
    Tensor::new(data, vec![rows, cols])
}

fn check_width(x: &Tensor<f64>, expected: usize) -> MlResult<()> {
    let (_, cols) = rank2(x)?;
    if cols != expected {
        return Err(MlError::DimensionMismatch(format!(
            "layer expects {} input features, got {}",
            expected, cols
        )));
    }
    Ok(())
}

fn backward_cache_missing() -> MlError {
    MlError::InvalidConfiguration("backward pass requires a preceding training forward".to_string())
}

/// Fully connected affine layer, `y = act(x·W + b)`, Xavier-uniform init.
pub struct Dense {
    pub in_features: usize,
    pub out_features: usize,
    pub weights: Tensor<f64>,
    pub bias: Option<Tensor<f64>>,
    pub activation: Option<Activation>,
    grad_weights: Tensor<f64>,
    grad_bias: Option<Tensor<f64>>,
    cache: Option<DenseCache>,
}

struct DenseCache {
    input: Tensor<f64>,
    output: Tensor<f64>,
}

impl Dense {
    pub fn new(
        in_features: usize,
        out_features: usize,
        activation: Option<Activation>,
        seed: Option<u64>,
    ) -> Self {
        let scale = (6.0 / (in_features + out_features) as f64).sqrt();
        let weights = Tensor::rand(vec![in_features, out_features], seed)
            .mul_scalar(2.0 * scale)
            .add_scalar(-scale);
        Dense {
            in_features,
            out_features,
            weights,
            bias: Some(Tensor::zeros(vec![out_features])),
            activation,
            grad_weights: Tensor::zeros(vec![in_features, out_features]),
            grad_bias: Some(Tensor::zeros(vec![out_features])),
            cache: None,
        }
    }

    pub fn without_bias(mut self) -> Self {
        self.bias = None;
        self.grad_bias = None;
        self
    }

    /// Rebuild a dense layer from exported weights.
    pub fn from_parts(
        in_features: usize,
        out_features: usize,
        weights: Tensor<f64>,
        bias: Option<Tensor<f64>>,
        activation: Option<Activation>,
    ) -> MlResult<Self> {
        if weights.shape_vec() != vec![in_features, out_features] {
            return Err(MlError::ShapeMismatch {
                expected: vec![in_features, out_features],
                got: weights.shape_vec(),
            });
        }
        if let Some(b) = &bias {
            if b.shape_vec() != vec![out_features] {
                return Err(MlError::ShapeMismatch {
                    expected: vec![out_features],
                    got: b.shape_vec(),
                });
            }
        }
        let grad_bias = bias.as_ref().map(|_| Tensor::zeros(vec![out_features]));
        Ok(Dense {
            in_features,
            out_features,
            weights,
            bias,
            activation,
            grad_weights: Tensor::zeros(vec![in_features, out_features]),
            grad_bias,
            cache: None,
        })
    }

    fn affine(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        check_width(x, self.in_features)?;
        let mut z = x.matmul(&self.weights)?;
        if let Some(bias) = &self.bias {
            z = rowwise(&z, bias, |a, b| a + b)?;
        }
        match self.activation {
            Some(act) => act.apply(&z),
            None => Ok(z),
        }
    }

    fn forward(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        self.affine(x)
    }

    fn forward_train(&mut self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let output = self.affine(x)?;
        self.cache = Some(DenseCache {
            input: x.clone(),
            output: output.clone(),
        });
        Ok(output)
    }

    fn backward(&mut self, grad_out: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let cache = self.cache.as_ref().ok_or_else(backward_cache_missing)?;

        let grad_z = match self.activation {
            Some(act) => act.backward(grad_out, &cache.output)?,
            None => grad_out.clone(),
        };

        self.grad_weights = cache.input.t()?.matmul(&grad_z)?;
        if self.bias.is_some() {
            self.grad_bias = Some(grad_z.sum_axis(0)?);
        }
        grad_z.matmul(&self.weights.t()?)
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor<f64>, &Tensor<f64>)> {
        let Dense {
            weights,
            bias,
            grad_weights,
            grad_bias,
            ..
        } = self;
        let mut pairs: Vec<(&mut Tensor<f64>, &Tensor<f64>)> = vec![(weights, &*grad_weights)];
        if let (Some(b), Some(gb)) = (bias.as_mut(), grad_bias.as_ref()) {
            pairs.push((b, gb));
        }
        pairs
    }
}

/// Standalone activation layer.
pub struct ActivationLayer {
    pub function: Activation,
    cache: Option<Tensor<f64>>,
}

impl ActivationLayer {
    pub fn new(function: Activation) -> Self {
        ActivationLayer {
            function,
            cache: None,
        }
    }

    fn forward(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        self.function.apply(x)
    }

    fn forward_train(&mut self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let output = self.function.apply(x)?;
        self.cache = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad_out: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let output = self.cache.as_ref().ok_or_else(backward_cache_missing)?;
        self.function.backward(grad_out, output)
    }
}

/// Inverted dropout: training zeroes each element with probability `rate`
/// and rescales the survivors; inference is the identity.
pub struct Dropout {
    pub rate: f64,
    rng: StdRng,
    mask: Option<Tensor<f64>>,
}

impl Dropout {
    pub fn new(rate: f64, seed: Option<u64>) -> MlResult<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(MlError::InvalidConfiguration(format!(
                "dropout rate must lie in [0, 1), got {}",
                rate
            )));
        }
        Ok(Dropout {
            rate,
            rng: rng_from_seed(seed),
            mask: None,
        })
    }

    fn forward(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        Ok(x.clone())
    }

    fn forward_train(&mut self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let scale = 1.0 / (1.0 - self.rate);
        let mask_data: Vec<f64> = (0..x.numel())
            .map(|_| {
                if self.rng.gen::<f64>() >= self.rate {
                    scale
                } else {
                    0.0
                }
            })
            .collect();
        let mask = Tensor::new(mask_data, x.shape_vec())?;
        let output = x.mul(&mask)?;
        self.mask = Some(mask);
        Ok(output)
    }

    fn backward(&mut self, grad_out: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let mask = self.mask.as_ref().ok_or_else(backward_cache_missing)?;
        grad_out.mul(mask)
    }
}

/// Batch normalization over the batch axis with learned scale and shift.
///
/// Training normalizes by batch statistics and updates the running mean and
/// variance; inference uses the running statistics, so repeated `predict`
/// calls are idempotent.
pub struct BatchNorm {
    pub features: usize,
    pub momentum: f64,
    pub eps: f64,
    pub gamma: Tensor<f64>,
    pub beta: Tensor<f64>,
    running_mean: Tensor<f64>,
    running_var: Tensor<f64>,
    grad_gamma: Tensor<f64>,
    grad_beta: Tensor<f64>,
    cache: Option<BnCache>,
}

struct BnCache {
    normalized: Tensor<f64>,
    std: Tensor<f64>,
}

impl BatchNorm {
    pub fn new(features: usize) -> Self {
        BatchNorm {
            features,
            momentum: 0.9,
            eps: 1e-5,
            gamma: Tensor::ones(vec![features]),
            beta: Tensor::zeros(vec![features]),
            running_mean: Tensor::zeros(vec![features]),
            running_var: Tensor::ones(vec![features]),
            grad_gamma: Tensor::zeros(vec![features]),
            grad_beta: Tensor::zeros(vec![features]),
            cache: None,
        }
    }

    /// Rebuild a batch-norm layer from exported statistics.
    pub fn from_parts(
        features: usize,
        gamma: Tensor<f64>,
        beta: Tensor<f64>,
        running_mean: Tensor<f64>,
        running_var: Tensor<f64>,
    ) -> MlResult<Self> {
        for t in [&gamma, &beta, &running_mean, &running_var] {
            if t.shape_vec() != vec![features] {
                return Err(MlError::ShapeMismatch {
                    expected: vec![features],
                    got: t.shape_vec(),
                });
            }
        }
        let mut layer = BatchNorm::new(features);
        layer.gamma = gamma;
        layer.beta = beta;
        layer.running_mean = running_mean;
        layer.running_var = running_var;
        Ok(layer)
    }

    pub fn running_mean(&self) -> &Tensor<f64> {
        &self.running_mean
    }

    pub fn running_var(&self) -> &Tensor<f64> {
        &self.running_var
    }

    fn scale_shift(&self, normalized: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let scaled = rowwise(normalized, &self.gamma, |a, g| a * g)?;
        rowwise(&scaled, &self.beta, |a, b| a + b)
    }

    fn forward(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        check_width(x, self.features)?;
        let std = self.running_var.add_scalar(self.eps).sqrt();
        let centered = rowwise(x, &self.running_mean, |a, m| a - m)?;
        let normalized = rowwise(&centered, &std, |a, s| a / s)?;
        self.scale_shift(&normalized)
    }

    fn forward_train(&mut self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        check_width(x, self.features)?;
        let mean = x.mean_axis(0)?;
        let var = x.var_axis(0)?;
        let std = var.add_scalar(self.eps).sqrt();

        let centered = rowwise(x, &mean, |a, m| a - m)?;
        let normalized = rowwise(&centered, &std, |a, s| a / s)?;

        self.running_mean = self
            .running_mean
            .mul_scalar(self.momentum)
            .add(&mean.mul_scalar(1.0 - self.momentum))?;
        self.running_var = self
            .running_var
            .mul_scalar(self.momentum)
            .add(&var.mul_scalar(1.0 - self.momentum))?;

        let output = self.scale_shift(&normalized)?;
        self.cache = Some(BnCache { normalized, std });
        Ok(output)
    }

    fn backward(&mut self, grad_out: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        let cache = self.cache.as_ref().ok_or_else(backward_cache_missing)?;
        let (rows, _) = rank2(grad_out)?;
        let n = rows as f64;

        self.grad_gamma = grad_out.mul(&cache.normalized)?.sum_axis(0)?;
        self.grad_beta = grad_out.sum_axis(0)?;

        let grad_norm = rowwise(grad_out, &self.gamma, |g, gm| g * gm)?;
        let sum_grad = grad_norm.sum_axis(0)?;
        let sum_grad_norm = grad_norm.mul(&cache.normalized)?.sum_axis(0)?;

        // dx = (n·dx̂ − Σdx̂ − x̂·Σ(dx̂·x̂)) / (n·σ)
        let term = rowwise(&grad_norm.mul_scalar(n), &sum_grad, |a, s| a - s)?;
        let correction = rowwise(&cache.normalized, &sum_grad_norm, |a, s| a * s)?;
        let numerator = term.sub(&correction)?;
        rowwise(&numerator, &cache.std, |a, s| a / (n * s))
    }

    fn params_and_grads(&mut self) -> Vec<(&mut Tensor<f64>, &Tensor<f64>)> {
        let BatchNorm {
            gamma,
            beta,
            grad_gamma,
            grad_beta,
            ..
        } = self;
        vec![(gamma, &*grad_gamma), (beta, &*grad_beta)]
    }
}

/// The closed set of layer kinds a [`crate::Network`] composes.
pub enum Layer {
    Dense(Dense),
    Activation(ActivationLayer),
    Dropout(Dropout),
    BatchNorm(BatchNorm),
}

impl Layer {
    /// Pure inference pass; never mutates the layer.
    pub fn forward(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        match self {
            Layer::Dense(l) => l.forward(x),
            Layer::Activation(l) => l.forward(x),
            Layer::Dropout(l) => l.forward(x),
            Layer::BatchNorm(l) => l.forward(x),
        }
    }

    /// Training pass: caches what the backward pass needs.
    pub(crate) fn forward_train(&mut self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        match self {
            Layer::Dense(l) => l.forward_train(x),
            Layer::Activation(l) => l.forward_train(x),
            Layer::Dropout(l) => l.forward_train(x),
            Layer::BatchNorm(l) => l.forward_train(x),
        }
    }

    /// Gradient with respect to this layer's input; parameter gradients are
    /// stored on the layer.
    pub(crate) fn backward(&mut self, grad_out: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        match self {
            Layer::Dense(l) => l.backward(grad_out),
            Layer::Activation(l) => l.backward(grad_out),
            Layer::Dropout(l) => l.backward(grad_out),
            Layer::BatchNorm(l) => l.backward(grad_out),
        }
    }

    pub(crate) fn params_and_grads(&mut self) -> Vec<(&mut Tensor<f64>, &Tensor<f64>)> {
        match self {
            Layer::Dense(l) => l.params_and_grads(),
            Layer::BatchNorm(l) => l.params_and_grads(),
            Layer::Activation(_) | Layer::Dropout(_) => Vec::new(),
        }
    }
}

impl From<Dense> for Layer {
    fn from(l: Dense) -> Self {
        Layer::Dense(l)
    }
}

impl From<ActivationLayer> for Layer {
    fn from(l: ActivationLayer) -> Self {
        Layer::Activation(l)
    }
}

impl From<Dropout> for Layer {
    fn from(l: Dropout) -> Self {
        Layer::Dropout(l)
    }
}

impl From<BatchNorm> for Layer {
    fn from(l: BatchNorm) -> Self {
        Layer::BatchNorm(l)
    }
}
