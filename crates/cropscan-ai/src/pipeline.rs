//! Image-to-label inference pipeline.
//!
//! [`InferenceContext`] is built once at startup from a model and a label
//! table; its configuration never changes afterwards. [`Pipeline`] wraps the
//! outcome of that load: when it failed, every [`Pipeline::classify`] call
//! reports [`ClassifyError::NotReady`] instead of attempting inference.

use cropscan_core::{ElementType, PreprocessConfig};
use tracing::{debug, error, warn};

use crate::error::{ClassifyError, LoadError};
use crate::labels::LabelTable;
use crate::model::InferenceModel;
use crate::preprocess::{InputType, Preprocessor};
use crate::raw_image::RawImage;

/// The winning class for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    /// Raw float score, or the quantized byte scaled to `0.0..=1.0`.
    pub score: f32,
}

/// A loaded model, its labels, and the pre-processing derived from its input spec.
pub struct InferenceContext {
    model: Box<dyn InferenceModel>,
    labels: LabelTable,
    preprocessor: Preprocessor,
    class_count: Option<usize>,
}

impl InferenceContext {
    /// Validate a loaded model against the pipeline's assumptions.
    ///
    /// The input must be a single float32 or uint8 image tensor and the output
    /// a flat class vector. A label count that differs from the class count
    /// is only logged: the per-call index check reports it precisely. With a
    /// dynamic class dimension there is nothing to compare against at load.
    pub fn new(
        model: Box<dyn InferenceModel>,
        labels: LabelTable,
        config: &PreprocessConfig,
    ) -> Result<Self, LoadError> {
        let input = model.input_spec();
        let input_type = InputType::try_from(input.element_type)?;
        let geometry = input.image_geometry(config.layout)?;

        let output = model.output_spec();
        let class_count = output.class_count()?;

        if !matches!(output.element_type, ElementType::Float32 | ElementType::Uint8) {
            warn!(
                output_type = %output.element_type,
                "model output type cannot be decoded, every classification will fail"
            );
        }
        match class_count {
            Some(classes) if classes != labels.len() => warn!(
                labels = labels.len(),
                classes,
                "label count does not match model output size"
            ),
            Some(_) => {}
            None => debug!(
                labels = labels.len(),
                "model output has a dynamic class dimension"
            ),
        }

        let preprocessor = Preprocessor::new(geometry, &input.shape, input_type, config);
        debug!(
            width = geometry.width,
            height = geometry.height,
            channels = geometry.channels,
            layout = ?geometry.layout,
            classes = ?class_count,
            "inference context ready"
        );

        Ok(Self {
            model,
            labels,
            preprocessor,
            class_count,
        })
    }

    /// Load the ONNX model and label file named in `config`.
    #[cfg(feature = "onnx")]
    pub fn load(config: &cropscan_core::PipelineConfig) -> Result<Self, LoadError> {
        let model = crate::onnx::OnnxModel::load(&config.model_path)?;
        let labels = LabelTable::from_file(&config.labels_path)?;
        Self::new(Box::new(model), labels, &config.preprocess)
    }

    pub fn model(&self) -> &dyn InferenceModel {
        self.model.as_ref()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Length of the model's class vector; `None` when the model leaves it dynamic.
    pub fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    /// Normalize, run one forward pass, decode, and resolve the label.
    pub fn classify(&mut self, image: &RawImage) -> Result<Prediction, ClassifyError> {
        let input = self.preprocessor.process(image)?;

        let output = self
            .model
            .run(&input)
            .map_err(|e| ClassifyError::Inference(format!("{e:#}")))?;

        let decoded = output.decode()?;
        let label = self.labels.resolve(decoded.index)?;

        debug!(
            index = decoded.index,
            score = decoded.score,
            label,
            "classified image"
        );
        Ok(Prediction {
            label: label.to_string(),
            index: decoded.index,
            score: decoded.score,
        })
    }
}

/// The classification entry point for the host application.
pub struct Pipeline {
    state: Result<InferenceContext, LoadError>,
}

impl Pipeline {
    pub fn new(context: InferenceContext) -> Self {
        Self { state: Ok(context) }
    }

    /// Wrap a load attempt. A failed load is logged and leaves the pipeline not ready.
    pub fn from_load(result: Result<InferenceContext, LoadError>) -> Self {
        if let Err(e) = &result {
            error!(error = %e, "model or labels failed to load, classification disabled");
        }
        Self { state: result }
    }

    /// Load from `config`; never fails, see [`Pipeline::from_load`].
    #[cfg(feature = "onnx")]
    pub fn load(config: &cropscan_core::PipelineConfig) -> Self {
        Self::from_load(InferenceContext::load(config))
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ok()
    }

    pub fn context(&self) -> Option<&InferenceContext> {
        self.state.as_ref().ok()
    }

    /// Why the pipeline is not ready, if it is not.
    pub fn load_error(&self) -> Option<&LoadError> {
        self.state.as_ref().err()
    }

    pub fn classify(&mut self, image: &RawImage) -> Result<Prediction, ClassifyError> {
        let context = self.state.as_mut().map_err(|_| ClassifyError::NotReady)?;
        context.classify(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::ModelOutput;
    use crate::preprocess::{NormalizedTensor, TensorData};
    use cropscan_core::{FitMode, TensorSpec};
    use image::{Rgb, RgbImage};
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    /// Inputs seen by a [`StubModel`], shared with the test.
    type Seen = Rc<RefCell<Vec<NormalizedTensor>>>;

    /// In-memory model returning a fixed output.
    struct StubModel {
        input: TensorSpec,
        output: TensorSpec,
        result: Result<ModelOutput, String>,
        seen: Seen,
    }

    impl InferenceModel for StubModel {
        fn input_spec(&self) -> &TensorSpec {
            &self.input
        }

        fn output_spec(&self) -> &TensorSpec {
            &self.output
        }

        fn run(&mut self, input: &NormalizedTensor) -> anyhow::Result<ModelOutput> {
            self.seen.borrow_mut().push(input.clone());
            self.result.clone().map_err(anyhow::Error::msg)
        }
    }

    fn stub(input: TensorSpec, output: TensorSpec, result: ModelOutput) -> (StubModel, Seen) {
        let seen = Seen::default();
        let model = StubModel {
            input,
            output,
            result: Ok(result),
            seen: seen.clone(),
        };
        (model, seen)
    }

    fn plant_labels() -> LabelTable {
        LabelTable::new(["healthy", "blight", "rust"])
    }

    fn float_classifier(scores: Vec<f32>) -> (StubModel, Seen) {
        let classes = scores.len() as i64;
        stub(
            TensorSpec::new([1, 224, 224, 3], ElementType::Float32),
            TensorSpec::new([1, classes], ElementType::Float32),
            ModelOutput::Float32(scores),
        )
    }

    fn leaf_photo(w: u32, h: u32) -> RawImage {
        RawImage::from_rgb_image(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 90])
        }))
        .unwrap()
    }

    fn ready(model: StubModel, labels: LabelTable) -> Pipeline {
        let context =
            InferenceContext::new(Box::new(model), labels, &PreprocessConfig::default()).unwrap();
        Pipeline::new(context)
    }

    #[test]
    fn end_to_end_float_model() {
        let (model, seen) = float_classifier(vec![0.05, 0.85, 0.10]);
        let mut pipeline = ready(model, plant_labels());

        let prediction = pipeline.classify(&leaf_photo(640, 480)).unwrap();
        assert_eq!(prediction.label, "blight");
        assert_eq!(prediction.index, 1);
        assert!((prediction.score - 0.85).abs() < 1e-6);

        // Exactly one forward pass with a correctly shaped float tensor.
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].shape, vec![1, 224, 224, 3]);
        assert!(matches!(&seen[0].data, TensorData::Float32(v) if v.len() == 224 * 224 * 3));
    }

    #[test]
    fn float_tie_picks_first() {
        let (model, _) = float_classifier(vec![0.2, 0.9, 0.9, 0.1]);
        let labels = LabelTable::new(["a", "b", "c", "d"]);
        let mut pipeline = ready(model, labels);

        let prediction = pipeline.classify(&leaf_photo(224, 224)).unwrap();
        assert_eq!(prediction.index, 1);
        assert_eq!(prediction.label, "b");
    }

    #[test]
    fn quantized_model_end_to_end() {
        let (model, seen) = stub(
            TensorSpec::new([1, 96, 96, 3], ElementType::Uint8),
            TensorSpec::new([1, 3], ElementType::Uint8),
            ModelOutput::Uint8(vec![10, 200, 200]),
        );
        let mut pipeline = ready(model, plant_labels());

        let prediction = pipeline.classify(&leaf_photo(300, 200)).unwrap();
        assert_eq!(prediction.label, "blight");
        assert!(matches!(&seen.borrow()[0].data, TensorData::Uint8(v) if v.len() == 96 * 96 * 3));
    }

    #[test]
    fn not_ready_without_load() {
        let mut pipeline = Pipeline::from_load(Err(LoadError::ModelNotFound(PathBuf::from(
            "model.onnx",
        ))));
        assert!(!pipeline.is_ready());
        assert!(pipeline.context().is_none());
        assert!(matches!(
            pipeline.load_error(),
            Some(LoadError::ModelNotFound(_))
        ));

        let err = pipeline.classify(&leaf_photo(10, 10)).unwrap_err();
        assert!(matches!(err, ClassifyError::NotReady));
    }

    #[test]
    fn short_label_table_is_out_of_range() {
        let (model, _) = float_classifier(vec![0.1, 0.2, 0.7]);
        let mut pipeline = ready(model, LabelTable::new(["healthy", "blight"]));

        match pipeline.classify(&leaf_photo(50, 50)) {
            Err(ClassifyError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn short_label_table_still_resolves_in_range() {
        let (model, _) = float_classifier(vec![0.9, 0.05, 0.05]);
        let mut pipeline = ready(model, LabelTable::new(["healthy", "blight"]));
        assert_eq!(pipeline.classify(&leaf_photo(50, 50)).unwrap().label, "healthy");
    }

    #[test]
    fn unsupported_output_type() {
        let (model, seen) = stub(
            TensorSpec::new([1, 224, 224, 3], ElementType::Float32),
            TensorSpec::new([1, 3], ElementType::Int64),
            ModelOutput::Unsupported(ElementType::Int64),
        );
        let mut pipeline = ready(model, plant_labels());

        match pipeline.classify(&leaf_photo(224, 224)) {
            Err(ClassifyError::UnsupportedOutputType(ty)) => assert_eq!(ty, ElementType::Int64),
            other => panic!("expected UnsupportedOutputType, got {other:?}"),
        }
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn inference_failure_is_reported_and_recoverable() {
        let seen = Seen::default();
        let model = StubModel {
            input: TensorSpec::new([1, 8, 8, 3], ElementType::Float32),
            output: TensorSpec::new([3], ElementType::Float32),
            result: Err("session crashed".to_string()),
            seen: seen.clone(),
        };
        let mut pipeline = ready(model, plant_labels());

        for _ in 0..2 {
            let err = pipeline.classify(&leaf_photo(8, 8)).unwrap_err();
            assert!(matches!(&err, ClassifyError::Inference(msg) if msg.contains("session crashed")));
        }
        assert!(pipeline.is_ready());
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn rejects_unsupported_input_type() {
        let (model, _) = stub(
            TensorSpec::new([1, 224, 224, 3], ElementType::Int32),
            TensorSpec::new([1, 3], ElementType::Float32),
            ModelOutput::Float32(vec![0.0; 3]),
        );
        let result =
            InferenceContext::new(Box::new(model), plant_labels(), &PreprocessConfig::default());
        assert!(matches!(
            result,
            Err(LoadError::UnsupportedInputType(ElementType::Int32))
        ));
    }

    #[test]
    fn rejects_non_flat_output() {
        let (model, _) = stub(
            TensorSpec::new([1, 320, 320, 3], ElementType::Float32),
            TensorSpec::new([1, 25, 4], ElementType::Float32),
            ModelOutput::Float32(vec![0.0; 100]),
        );
        let result =
            InferenceContext::new(Box::new(model), plant_labels(), &PreprocessConfig::default());
        assert!(matches!(result, Err(LoadError::Shape(_))));
    }

    #[test]
    fn rejects_non_image_input() {
        let (model, _) = stub(
            TensorSpec::new([1, 512], ElementType::Float32),
            TensorSpec::new([1, 3], ElementType::Float32),
            ModelOutput::Float32(vec![0.0; 3]),
        );
        let result =
            InferenceContext::new(Box::new(model), plant_labels(), &PreprocessConfig::default());
        assert!(matches!(result, Err(LoadError::Shape(_))));
    }

    #[test]
    fn context_reports_geometry_and_classes() {
        let (model, _) = stub(
            TensorSpec::new([1, 3, 240, 320], ElementType::Float32),
            TensorSpec::new([1, 3], ElementType::Float32),
            ModelOutput::Float32(vec![0.0; 3]),
        );
        let config = PreprocessConfig {
            fit: FitMode::Pad,
            ..Default::default()
        };
        let context = InferenceContext::new(Box::new(model), plant_labels(), &config).unwrap();

        let geometry = context.preprocessor().geometry();
        assert_eq!((geometry.width, geometry.height), (320, 240));
        assert_eq!(context.class_count(), Some(3));
        assert_eq!(context.labels().len(), 3);
        assert_eq!(context.model().output_spec().element_type, ElementType::Float32);
    }

    #[test]
    fn dynamic_class_dimension_resolves_per_call() {
        let (model, _) = stub(
            TensorSpec::new([1, 224, 224, 3], ElementType::Float32),
            TensorSpec::new([1, -1], ElementType::Float32),
            ModelOutput::Float32(vec![0.1, 0.2, 0.7]),
        );
        let context =
            InferenceContext::new(Box::new(model), plant_labels(), &PreprocessConfig::default())
                .unwrap();
        assert_eq!(context.class_count(), None);

        let mut pipeline = Pipeline::new(context);
        assert_eq!(pipeline.classify(&leaf_photo(100, 100)).unwrap().label, "rust");
    }

    #[test]
    fn int64_input_rejected_before_any_packing() {
        let (model, seen) = stub(
            TensorSpec::new([1, 3, 224, 224], ElementType::Int64),
            TensorSpec::new([1, 3], ElementType::Float32),
            ModelOutput::Float32(vec![0.0; 3]),
        );
        let pipeline = Pipeline::from_load(InferenceContext::new(
            Box::new(model),
            plant_labels(),
            &PreprocessConfig::default(),
        ));
        assert!(matches!(
            pipeline.load_error(),
            Some(LoadError::UnsupportedInputType(ElementType::Int64))
        ));
        assert!(seen.borrow().is_empty());
    }
}
