use ember_ml_core::{MlError, MlResult, Tensor};
use ember_ml_nn::{Activation, ActivationLayer, BatchNorm, Dense, Dropout, Layer, Network};
use serde::{Deserialize, Serialize};

/// Named, typed description of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub format_version: u32,
    pub producer: String,
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        ModelMetadata {
            name: name.into(),
            format_version: 1,
            producer: "ember-ml".to_string(),
        }
    }
}

/// Shape of one model input or output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub size: usize,
}

/// One layer of an exported model, with raw weight and bias arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        in_features: usize,
        out_features: usize,
        weights: Vec<f64>,
        bias: Option<Vec<f64>>,
        activation: Option<String>,
    },
    Activation {
        function: String,
    },
    Dropout {
        rate: f64,
    },
    BatchNorm {
        features: usize,
        gamma: Vec<f64>,
        beta: Vec<f64>,
        running_mean: Vec<f64>,
        running_var: Vec<f64>,
    },
}

/// Model-agnostic, JSON-serializable description of a trained network.
///
/// The spec is an in-memory structure; persisting the JSON text anywhere is
/// the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub metadata: ModelMetadata,
    pub inputs: Vec<FeatureSpec>,
    pub outputs: Vec<FeatureSpec>,
    pub layers: Vec<LayerSpec>,
}

impl ModelSpec {
    /// Snapshot a network's layers and weights.
    pub fn from_network(network: &Network, metadata: ModelMetadata) -> MlResult<Self> {
        let mut layers = Vec::with_capacity(network.layers().len());
        let mut input_size = None;
        let mut output_size = None;

        for layer in network.layers() {
            let spec = match layer {
                Layer::Dense(dense) => {
                    input_size.get_or_insert(dense.in_features);
                    output_size = Some(dense.out_features);
                    LayerSpec::Dense {
                        in_features: dense.in_features,
                        out_features: dense.out_features,
                        weights: dense.weights.data().to_vec(),
                        bias: dense.bias.as_ref().map(|b| b.data().to_vec()),
                        activation: dense.activation.map(|a| a.name().to_string()),
                    }
                }
                Layer::Activation(act) => LayerSpec::Activation {
                    function: act.function.name().to_string(),
                },
                Layer::Dropout(dropout) => LayerSpec::Dropout { rate: dropout.rate },
                Layer::BatchNorm(bn) => LayerSpec::BatchNorm {
                    features: bn.features,
                    gamma: bn.gamma.data().to_vec(),
                    beta: bn.beta.data().to_vec(),
                    running_mean: bn.running_mean().data().to_vec(),
                    running_var: bn.running_var().data().to_vec(),
                },
            };
            layers.push(spec);
        }

        let (Some(input_size), Some(output_size)) = (input_size, output_size) else {
            return Err(MlError::InvalidConfiguration(
                "cannot export a network with no dense layers".to_string(),
            ));
        };

        Ok(ModelSpec {
            metadata,
            inputs: vec![FeatureSpec {
                name: "input".to_string(),
                size: input_size,
            }],
            outputs: vec![FeatureSpec {
                name: "output".to_string(),
                size: output_size,
            }],
            layers,
        })
    }

    /// Rebuild a network from the spec. The result is in the Built state;
    /// the caller compiles it before training or prediction.
    pub fn into_network(&self) -> MlResult<Network> {
        let mut network = Network::new();
        for layer in &self.layers {
            match layer {
                LayerSpec::Dense {
                    in_features,
                    out_features,
                    weights,
                    bias,
                    activation,
                } => {
                    let weights =
                        Tensor::new(weights.clone(), vec![*in_features, *out_features])?;
                    let bias = bias
                        .as_ref()
                        .map(|b| Tensor::new(b.clone(), vec![*out_features]))
                        .transpose()?;
                    let activation = activation
                        .as_deref()
                        .map(Activation::from_name)
                        .transpose()?;
                    network.add(Dense::from_parts(
                        *in_features,
                        *out_features,
                        weights,
                        bias,
                        activation,
                    )?);
                }
                LayerSpec::Activation { function } => {
                    network.add(ActivationLayer::new(Activation::from_name(function)?));
                }
                LayerSpec::Dropout { rate } => {
                    network.add(Dropout::new(*rate, None)?);
                }
                LayerSpec::BatchNorm {
                    features,
                    gamma,
                    beta,
                    running_mean,
                    running_var,
                } => {
                    network.add(BatchNorm::from_parts(
                        *features,
                        Tensor::new(gamma.clone(), vec![*features])?,
                        Tensor::new(beta.clone(), vec![*features])?,
                        Tensor::new(running_mean.clone(), vec![*features])?,
                        Tensor::new(running_var.clone(), vec![*features])?,
                    )?);
                }
            }
        }
        Ok(network)
    }

    pub fn to_json(&self) -> MlResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MlError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> MlResult<Self> {
        serde_json::from_str(json).map_err(|e| MlError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_ml_loss::Loss;
    use ember_ml_optim::Optimizer;

    fn trained_network() -> (Network, Tensor<f64>) {
        let x = Tensor::new(
            vec![0.0, 0.0, 0.2, 0.1, 0.9, 1.0, 1.0, 0.8],
            vec![4, 2],
        )
        .unwrap();
        let y = Tensor::new(vec![0.0, 0.0, 1.0, 1.0], vec![4, 1]).unwrap();

        let mut net = Network::new().with_seed(42);
        net.add(Dense::new(2, 4, Some(Activation::Relu), Some(42)));
        net.add(Dense::new(4, 1, Some(Activation::Sigmoid), Some(43)));
        net.compile(Optimizer::sgd(0.5, 0.0).unwrap(), Loss::BinaryCrossEntropy)
            .unwrap();
        net.train(&x, &y, 50, 4, false).unwrap();
        (net, x)
    }

    #[test]
    fn test_spec_captures_layers_and_descriptors() {
        let (net, _) = trained_network();
        let spec = ModelSpec::from_network(&net, ModelMetadata::new("demo")).unwrap();
        assert_eq!(spec.layers.len(), 2);
        assert_eq!(spec.inputs[0].size, 2);
        assert_eq!(spec.outputs[0].size, 1);
        assert_eq!(spec.metadata.name, "demo");

        match &spec.layers[0] {
            LayerSpec::Dense {
                in_features,
                out_features,
                weights,
                bias,
                activation,
            } => {
                assert_eq!((*in_features, *out_features), (2, 4));
                assert_eq!(weights.len(), 8);
                assert_eq!(bias.as_ref().unwrap().len(), 4);
                assert_eq!(activation.as_deref(), Some("relu"));
            }
            other => panic!("expected dense layer, got {:?}", other),
        }
    }

    #[test]
    fn test_json_roundtrip_preserves_spec() {
        let (net, _) = trained_network();
        let spec = ModelSpec::from_network(&net, ModelMetadata::new("demo")).unwrap();
        let json = spec.to_json().unwrap();
        let restored = ModelSpec::from_json(&json).unwrap();
        assert_eq!(spec, restored);
    }

    #[test]
    fn test_restored_network_predicts_identically() {
        let (net, x) = trained_network();
        let spec = ModelSpec::from_network(&net, ModelMetadata::new("demo")).unwrap();

        let mut restored = spec.into_network().unwrap();
        restored
            .compile(Optimizer::sgd(0.1, 0.0).unwrap(), Loss::BinaryCrossEntropy)
            .unwrap();

        assert_eq!(net.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn test_export_without_dense_rejected() {
        let mut net = Network::new();
        net.add(ActivationLayer::new(Activation::Relu));
        assert!(matches!(
            ModelSpec::from_network(&net, ModelMetadata::new("x")),
            Err(MlError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            ModelSpec::from_json("{not json"),
            Err(MlError::Serialization(_))
        ));
    }
}
