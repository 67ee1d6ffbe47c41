use std::path::Path;

use parking_lot::Mutex;
use tch::{Device, IValue, Kind, Tensor, no_grad};

use crate::{
    error::ServiceError,
    model::Classifier,
    preprocess::{ImageTensor, PreprocessConfig},
};

/// TorchScript classifier driven through libtorch.
pub struct TorchClassifier {
    device: Device,
    apply_softmax: bool,
    num_outputs: usize,
    module: Mutex<tch::CModule>,
}

impl TorchClassifier {
    pub fn load(
        module_path: &Path,
        device: Device,
        preprocess: &PreprocessConfig,
        apply_softmax: bool,
    ) -> Result<Self, ServiceError> {
        let mut module = tch::CModule::load_on_device(module_path, device)
            .map_err(|e| ServiceError::Other(format!("failed to load torchscript module: {e}")))?;
        module.set_eval();

        let mut classifier = Self {
            device,
            apply_softmax,
            num_outputs: 0,
            module: Mutex::new(module),
        };

        // A zero-filled probe tells us the output width up front and fails
        // early if the module does not accept the configured input shape.
        let shape = preprocess.tensor_shape();
        let probe = ImageTensor {
            data: vec![0.0; shape.iter().product()],
            shape,
        };
        classifier.num_outputs = classifier.run(&probe)?.len();

        tracing::debug!(
            outputs = classifier.num_outputs,
            ?device,
            "torchscript probe forward succeeded"
        );
        Ok(classifier)
    }

    fn run(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        let dims: Vec<i64> = input.shape.iter().map(|&d| d as i64).collect();

        no_grad(|| {
            let input_tensor = Tensor::from_slice(&input.data)
                .reshape(dims.as_slice())
                .to(self.device);

            let output = self
                .module
                .lock()
                .forward_is(&[IValue::Tensor(input_tensor)])
                .map_err(|e| ServiceError::Inference(e.to_string()))?;

            let scores = first_tensor(output)?;
            // Drop the batch dimension: [1, classes] -> [classes]
            let scores = if scores.dim() > 1 { scores.get(0) } else { scores };
            let scores = if self.apply_softmax {
                scores.softmax(-1, Kind::Float)
            } else {
                scores.to_kind(Kind::Float)
            };

            let flat = scores.to(Device::Cpu).reshape([-1]);
            Vec::<f32>::try_from(&flat).map_err(|e| ServiceError::Inference(e.to_string()))
        })
    }
}

impl Classifier for TorchClassifier {
    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        self.run(input)
    }
}

/// Traced models return either a tensor or a tuple led by the scores.
fn first_tensor(output: IValue) -> Result<Tensor, ServiceError> {
    match output {
        IValue::Tensor(t) => Ok(t),
        IValue::Tuple(tuple) | IValue::GenericList(tuple) => match tuple.into_iter().next() {
            Some(IValue::Tensor(t)) => Ok(t),
            _ => Err(ServiceError::Inference(
                "expected tensor as first tuple element".into(),
            )),
        },
        _ => Err(ServiceError::Inference("unexpected model output format".into())),
    }
}
