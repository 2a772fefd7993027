use crate::layers::Layer;
use ember_ml_core::{rng_from_seed, MlError, MlResult, Tensor};
use ember_ml_loss::Loss;
use ember_ml_optim::Optimizer;
use rand::seq::SliceRandom;

/// Per-epoch training record returned by [`Network::train`].
///
/// `accuracy` is present for classification losses only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    pub loss: Vec<f64>,
    pub accuracy: Option<Vec<f64>>,
}

/// An ordered layer stack with an optimizer and loss.
///
/// Lifecycle: build with [`add`](Network::add), then
/// [`compile`](Network::compile), then train; `train`, `evaluate` and
/// `predict` before `compile` fail with NotFitted. Adjacent layer widths are
/// checked lazily at the first forward pass and mismatches fail with
/// DimensionMismatch.
///
/// A NaN loss (divergence) is recorded in the history like any other epoch;
/// it is not detected or raised.
pub struct Network {
    layers: Vec<Layer>,
    optimizer: Option<Optimizer>,
    loss: Option<Loss>,
    /// Shuffle sample order each epoch.
    pub shuffle: bool,
    /// Seed for the epoch shuffling; `None` draws fresh entropy.
    pub seed: Option<u64>,
}

impl Network {
    pub fn new() -> Self {
        Network {
            layers: Vec::new(),
            optimizer: None,
            loss: None,
            shuffle: true,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Append a layer. Widths are not checked here; the first forward pass
    /// fails fast on any disagreement.
    pub fn add(&mut self, layer: impl Into<Layer>) -> &mut Self {
        self.layers.push(layer.into());
        self
    }

    /// Set the optimizer and loss, moving the network to the Compiled state.
    pub fn compile(&mut self, optimizer: Optimizer, loss: Loss) -> MlResult<()> {
        if self.layers.is_empty() {
            return Err(MlError::InvalidConfiguration(
                "cannot compile a network with no layers".to_string(),
            ));
        }
        self.optimizer = Some(optimizer);
        self.loss = Some(loss);
        Ok(())
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn loss(&self) -> Option<Loss> {
        self.loss
    }

    fn compiled_loss(&self) -> MlResult<Loss> {
        self.loss.ok_or(MlError::NotFitted("Network"))
    }

    /// Pure forward pass; valid any time after compile and never mutates
    /// weights, so consecutive calls with the same input agree exactly.
    pub fn predict(&self, x: &Tensor<f64>) -> MlResult<Tensor<f64>> {
        self.compiled_loss()?;
        let mut activation = x.clone();
        for layer in &self.layers {
            activation = layer.forward(&activation)?;
        }
        Ok(activation)
    }

    /// Loss and (for classification losses) accuracy on the given data,
    /// without touching any weights.
    pub fn evaluate(&self, x: &Tensor<f64>, y: &Tensor<f64>) -> MlResult<(f64, Option<f64>)> {
        let loss = self.compiled_loss()?;
        let pred = self.predict(x)?;
        let value = loss.value(&pred, y)?;
        let accuracy = if loss.is_classification() {
            Some(classification_accuracy(loss, &pred, y)?)
        } else {
            None
        };
        Ok((value, accuracy))
    }

    /// Mini-batch gradient descent training loop.
    ///
    /// Per epoch: shuffle the sample order (seeded), slice into batches, run
    /// the training forward pass, backpropagate in reverse layer order, and
    /// apply the optimizer to every parameter from the accumulated batch
    /// gradients. Appends the mean epoch loss (and accuracy for
    /// classification losses) to the returned history.
    pub fn train(
        &mut self,
        x: &Tensor<f64>,
        y: &Tensor<f64>,
        epochs: usize,
        batch_size: usize,
        verbose: bool,
    ) -> MlResult<History> {
        let loss = self.compiled_loss()?;
        if epochs == 0 {
            return Err(MlError::InvalidConfiguration(
                "epochs must be positive".to_string(),
            ));
        }
        if batch_size == 0 {
            return Err(MlError::InvalidConfiguration(
                "batch size must be positive".to_string(),
            ));
        }
        let n = check_sample_counts(x, y)?;

        let mut rng = rng_from_seed(self.seed);
        let mut history = History {
            loss: Vec::with_capacity(epochs),
            accuracy: loss.is_classification().then(Vec::new),
        };

        for epoch in 0..epochs {
            let mut order: Vec<usize> = (0..n).collect();
            if self.shuffle {
                order.shuffle(&mut rng);
            }

            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                let xb = gather_rows(x, batch)?;
                let yb = gather_rows(y, batch)?;

                let mut activation = xb;
                for layer in self.layers.iter_mut() {
                    activation = layer.forward_train(&activation)?;
                }

                epoch_loss += loss.value(&activation, &yb)? * batch.len() as f64;

                let mut grad = loss.gradient(&activation, &yb)?;
                for layer in self.layers.iter_mut().rev() {
                    grad = layer.backward(&grad)?;
                }

                let optimizer = self
                    .optimizer
                    .as_mut()
                    .ok_or(MlError::NotFitted("Network"))?;
                let params: Vec<_> = self
                    .layers
                    .iter_mut()
                    .flat_map(|layer| layer.params_and_grads())
                    .collect();
                optimizer.step(params)?;
            }

            let mean_loss = epoch_loss / n as f64;
            history.loss.push(mean_loss);

            let mut epoch_accuracy = None;
            if let Some(accuracies) = history.accuracy.as_mut() {
                let pred = self.predict(x)?;
                let acc = classification_accuracy(loss, &pred, y)?;
                accuracies.push(acc);
                epoch_accuracy = Some(acc);
            }

            if verbose {
                match epoch_accuracy {
                    Some(acc) => println!(
                        "epoch {}/{} - loss: {:.6} - accuracy: {:.4}",
                        epoch + 1,
                        epochs,
                        mean_loss,
                        acc
                    ),
                    None => println!("epoch {}/{} - loss: {:.6}", epoch + 1, epochs, mean_loss),
                }
            }
        }

        Ok(history)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

fn check_sample_counts(x: &Tensor<f64>, y: &Tensor<f64>) -> MlResult<usize> {
    if x.ndim() != 2 || y.ndim() != 2 {
        return Err(MlError::DimensionMismatch(format!(
            "expected [samples, features] inputs, got ranks {} and {}",
            x.ndim(),
            y.ndim()
        )));
    }
    let n = x.shape().dim(0)?;
    if n != y.shape().dim(0)? {
        return Err(MlError::DimensionMismatch(format!(
            "x has {} samples but y has {}",
            n,
            y.shape().dim(0)?
        )));
    }
    if n == 0 {
        return Err(MlError::EmptyInput);
    }
    Ok(n)
}

fn gather_rows(t: &Tensor<f64>, indices: &[usize]) -> MlResult<Tensor<f64>> {
    let cols = t.shape().dim(1)?;
    let mut data = Vec::with_capacity(indices.len() * cols);
    for &i in indices {
        data.extend_from_slice(t.row(i)?.data());
    }
    Tensor::new(data, vec![indices.len(), cols])
}

/// Accuracy for classification outputs: thresholded agreement for binary
/// cross-entropy, row argmax agreement for categorical cross-entropy.
fn classification_accuracy(loss: Loss, pred: &Tensor<f64>, y: &Tensor<f64>) -> MlResult<f64> {
    match loss {
        Loss::BinaryCrossEntropy => {
            let correct = pred
                .data()
                .iter()
                .zip(y.data().iter())
                .filter(|(&p, &t)| (p >= 0.5) == (t >= 0.5))
                .count();
            Ok(correct as f64 / pred.numel() as f64)
        }
        Loss::CategoricalCrossEntropy => {
            let pred_classes = pred.argmax_axis(1)?;
            let true_classes = y.argmax_axis(1)?;
            let correct = pred_classes
                .iter()
                .zip(true_classes.iter())
                .filter(|(p, t)| p == t)
                .count();
            Ok(correct as f64 / pred_classes.len() as f64)
        }
        Loss::Mse => Err(MlError::InvalidConfiguration(
            "accuracy is undefined for a regression loss".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Activation, ActivationLayer, BatchNorm, Dense, Dropout};

    fn binary_data() -> (Tensor<f64>, Tensor<f64>) {
        let x = Tensor::new(
            vec![
                0.0, 0.0, 0.2, 0.1, 0.1, 0.3, 0.9, 1.0, 1.0, 0.8, 0.8, 0.9,
            ],
            vec![6, 2],
        )
        .unwrap();
        let y = Tensor::new(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0], vec![6, 1]).unwrap();
        (x, y)
    }

    fn compiled_binary_net() -> Network {
        let mut net = Network::new().with_seed(42);
        net.add(Dense::new(2, 1, Some(Activation::Sigmoid), Some(42)));
        net.compile(Optimizer::sgd(0.5, 0.0).unwrap(), Loss::BinaryCrossEntropy)
            .unwrap();
        net
    }

    #[test]
    fn test_train_reduces_loss_and_reaches_accuracy() {
        let (x, y) = binary_data();
        let mut net = compiled_binary_net();
        let history = net.train(&x, &y, 200, 3, false).unwrap();

        assert_eq!(history.loss.len(), 200);
        assert!(history.loss[199] < history.loss[0]);
        let accuracy = history.accuracy.as_ref().unwrap();
        assert_eq!(accuracy.len(), 200);
        assert_eq!(accuracy[199], 1.0);
    }

    #[test]
    fn test_train_before_compile() {
        let (x, y) = binary_data();
        let mut net = Network::new();
        net.add(Dense::new(2, 1, Some(Activation::Sigmoid), None));
        assert_eq!(
            net.train(&x, &y, 1, 2, false),
            Err(MlError::NotFitted("Network"))
        );
    }

    #[test]
    fn test_predict_before_compile() {
        let net = Network::new();
        assert!(net.predict(&Tensor::zeros(vec![1, 2])).is_err());
    }

    #[test]
    fn test_compile_empty_network() {
        let mut net = Network::new();
        assert!(matches!(
            net.compile(Optimizer::adam(0.01).unwrap(), Loss::Mse),
            Err(MlError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_layer_width_mismatch_fails_fast() {
        let (x, y) = binary_data();
        let mut net = Network::new();
        net.add(Dense::new(2, 4, Some(Activation::Relu), Some(1)));
        net.add(Dense::new(8, 1, Some(Activation::Sigmoid), Some(2)));
        net.compile(Optimizer::sgd(0.1, 0.0).unwrap(), Loss::BinaryCrossEntropy)
            .unwrap();
        assert!(matches!(
            net.train(&x, &y, 1, 2, false),
            Err(MlError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_evaluate_never_mutates_weights() {
        let (x, y) = binary_data();
        let mut net = compiled_binary_net();
        net.train(&x, &y, 20, 3, false).unwrap();

        let before = net.predict(&x).unwrap();
        let (loss_a, acc_a) = net.evaluate(&x, &y).unwrap();
        let (loss_b, acc_b) = net.evaluate(&x, &y).unwrap();
        let after = net.predict(&x).unwrap();

        assert_eq!(before, after);
        assert_eq!(loss_a, loss_b);
        assert_eq!(acc_a, acc_b);
    }

    #[test]
    fn test_predict_idempotent() {
        let (x, y) = binary_data();
        let mut net = compiled_binary_net();
        net.train(&x, &y, 10, 2, false).unwrap();
        assert_eq!(net.predict(&x).unwrap(), net.predict(&x).unwrap());
    }

    #[test]
    fn test_seeded_training_reproducible() {
        let (x, y) = binary_data();
        let mut a = compiled_binary_net();
        let ha = a.train(&x, &y, 30, 2, false).unwrap();
        let mut b = compiled_binary_net();
        let hb = b.train(&x, &y, 30, 2, false).unwrap();
        assert_eq!(ha.loss, hb.loss);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_multiclass_softmax_training() {
        // Three well-separated blobs, one-hot targets.
        let x = Tensor::new(
            vec![
                0.0, 0.0, 0.2, 0.1, 0.1, 0.2, 5.0, 5.0, 5.2, 5.1, 5.1, 5.2, 0.0, 5.0, 0.2, 5.1,
                0.1, 5.2,
            ],
            vec![9, 2],
        )
        .unwrap();
        let y = Tensor::new(
            vec![
                1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0,
                1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0,
            ],
            vec![9, 3],
        )
        .unwrap();

        let mut net = Network::new().with_seed(7);
        net.add(Dense::new(2, 16, Some(Activation::Relu), Some(7)));
        net.add(Dense::new(16, 3, Some(Activation::Softmax), Some(8)));
        net.compile(
            Optimizer::adam(0.05).unwrap(),
            Loss::CategoricalCrossEntropy,
        )
        .unwrap();

        let history = net.train(&x, &y, 300, 9, false).unwrap();
        assert_eq!(*history.accuracy.unwrap().last().unwrap(), 1.0);

        let (_, accuracy) = net.evaluate(&x, &y).unwrap();
        assert_eq!(accuracy, Some(1.0));
    }

    #[test]
    fn test_dropout_and_batchnorm_stack_trains() {
        let (x, y) = binary_data();
        let mut net = Network::new().with_seed(3);
        net.add(Dense::new(2, 8, None, Some(3)));
        net.add(BatchNorm::new(8));
        net.add(ActivationLayer::new(Activation::Relu));
        net.add(Dropout::new(0.2, Some(4)).unwrap());
        net.add(Dense::new(8, 1, Some(Activation::Sigmoid), Some(5)));
        net.compile(Optimizer::adam(0.05).unwrap(), Loss::BinaryCrossEntropy)
            .unwrap();

        let history = net.train(&x, &y, 150, 6, false).unwrap();
        assert!(history.loss.last().unwrap() < &history.loss[0]);
        // Inference path (dropout off, running stats) still classifies.
        let (_, accuracy) = net.evaluate(&x, &y).unwrap();
        assert!(accuracy.unwrap() >= 5.0 / 6.0);
    }

    #[test]
    fn test_invalid_batch_and_epochs() {
        let (x, y) = binary_data();
        let mut net = compiled_binary_net();
        assert!(net.train(&x, &y, 0, 2, false).is_err());
        assert!(net.train(&x, &y, 1, 0, false).is_err());
    }

    #[test]
    fn test_mse_history_has_no_accuracy() {
        let x = Tensor::new(vec![0.0, 1.0, 2.0, 3.0], vec![4, 1]).unwrap();
        let y = Tensor::new(vec![0.0, 2.0, 4.0, 6.0], vec![4, 1]).unwrap();
        let mut net = Network::new().with_seed(1);
        net.add(Dense::new(1, 1, None, Some(1)));
        net.compile(Optimizer::sgd(0.05, 0.0).unwrap(), Loss::Mse)
            .unwrap();
        let history = net.train(&x, &y, 100, 4, false).unwrap();
        assert!(history.accuracy.is_none());
        let (loss, accuracy) = net.evaluate(&x, &y).unwrap();
        assert!(loss < 0.1, "loss = {}", loss);
        assert!(accuracy.is_none());
    }
}
