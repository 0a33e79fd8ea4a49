//! The seam between the pipeline and an inference backend.

use cropscan_core::TensorSpec;

use crate::decode::ModelOutput;
use crate::preprocess::NormalizedTensor;

/// A loaded, frozen classification model with one image input and one score output.
///
/// Implementations report their tensor specs once at load; the pipeline
/// derives pre-processing from [`input_spec`](Self::input_spec) and trusts
/// [`run`](Self::run) to return scores in the type of
/// [`output_spec`](Self::output_spec).
pub trait InferenceModel {
    fn input_spec(&self) -> &TensorSpec;

    fn output_spec(&self) -> &TensorSpec;

    /// One synchronous forward pass.
    fn run(&mut self, input: &NormalizedTensor) -> anyhow::Result<ModelOutput>;
}
