use crate::{error::ServiceError, preprocess::ImageTensor};

/// A loaded image classifier.
///
/// `forward` is blocking and is always driven from the blocking pool.
pub trait Classifier: Send + Sync {
    /// Width of the output vector, one score per class.
    fn num_outputs(&self) -> usize;

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError>;
}
