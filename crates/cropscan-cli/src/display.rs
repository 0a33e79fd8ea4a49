//! Result display for the terminal.
//!
//! One line per image in text mode (`source: label (score)`), or one JSON
//! object per line with `--json`. Model inspection renders as an aligned
//! key/value card.

use std::io::Write;

use cropscan_ai::{InferenceContext, Prediction};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

/// Display sink for classification results.
pub struct Display<W: Write> {
    out: W,
    format: Format,
}

// ── Public API ──

impl<W: Write> Display<W> {
    pub fn new(out: W, format: Format) -> Self {
        Self { out, format }
    }

    pub fn prediction(&mut self, source: &str, prediction: &Prediction) -> std::io::Result<()> {
        match self.format {
            Format::Text => writeln!(
                self.out,
                "{source}: {} ({:.3})",
                prediction.label, prediction.score
            ),
            Format::Json => self.json_line(json!({
                "source": source,
                "label": prediction.label,
                "index": prediction.index,
                "score": prediction.score,
            })),
        }
    }

    pub fn failure(&mut self, source: &str, error: &dyn std::error::Error) -> std::io::Result<()> {
        match self.format {
            Format::Text => writeln!(self.out, "{source}: error: {error}"),
            Format::Json => self.json_line(json!({
                "source": source,
                "error": error.to_string(),
            })),
        }
    }

    /// Describe the loaded model: tensor specs, derived geometry, label count.
    pub fn inspect(&mut self, model_path: &str, context: &InferenceContext) -> std::io::Result<()> {
        let input = context.model().input_spec();
        let output = context.model().output_spec();
        let geometry = context.preprocessor().geometry();
        let layout = format!("{:?}", geometry.layout).to_lowercase();
        let classes = context.class_count();

        match self.format {
            Format::Text => {
                let rows = [
                    ("model", model_path.to_string()),
                    ("input", input.to_string()),
                    (
                        "input geometry",
                        format!(
                            "{}x{}, {} channel(s), {layout}",
                            geometry.width, geometry.height, geometry.channels
                        ),
                    ),
                    ("output", output.to_string()),
                    (
                        "classes",
                        classes.map_or_else(|| "dynamic".to_string(), |n| n.to_string()),
                    ),
                    ("labels", context.labels().len().to_string()),
                ];
                for (key, value) in rows {
                    writeln!(self.out, "  {key:<16} {value}")?;
                }
                if classes.is_some_and(|n| n != context.labels().len()) {
                    writeln!(
                        self.out,
                        "  warning: label file and model output disagree on the number of classes"
                    )?;
                }
                Ok(())
            }
            Format::Json => self.json_line(json!({
                "model": model_path,
                "input": {
                    "shape": input.shape,
                    "type": input.element_type.as_str(),
                    "width": geometry.width,
                    "height": geometry.height,
                    "channels": geometry.channels,
                    "layout": layout,
                },
                "output": {
                    "shape": output.shape,
                    "type": output.element_type.as_str(),
                },
                "classes": classes,
                "labels": context.labels().iter().collect::<Vec<_>>(),
            })),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // ── Helpers ──

    fn json_line(&mut self, value: serde_json::Value) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, &value)?;
        writeln!(self.out)
    }
}
