//! Output decoding: pick the best class from the model's score vector.

use cropscan_core::ElementType;

use crate::error::ClassifyError;

/// Raw scores returned by one forward pass, tagged by element type.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Float32(Vec<f32>),
    /// Quantized scores, compared as unsigned bytes.
    Uint8(Vec<u8>),
    /// The backend produced an element type we cannot decode; no data is kept.
    Unsupported(ElementType),
}

/// Winning class index and its score.
///
/// For quantized outputs the score is the byte value scaled to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decoded {
    pub index: usize,
    pub score: f32,
}

impl ModelOutput {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Float32(_) => ElementType::Float32,
            Self::Uint8(_) => ElementType::Uint8,
            Self::Unsupported(ty) => *ty,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Uint8(v) => v.len(),
            Self::Unsupported(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Argmax over the flat score vector, lowest index winning ties.
    pub fn decode(&self) -> Result<Decoded, ClassifyError> {
        match self {
            Self::Float32(scores) => {
                let index = argmax_f32(scores).ok_or(ClassifyError::EmptyOutput)?;
                Ok(Decoded {
                    index,
                    score: scores[index],
                })
            }
            Self::Uint8(scores) => {
                let index = argmax_u8(scores).ok_or(ClassifyError::EmptyOutput)?;
                Ok(Decoded {
                    index,
                    score: f32::from(scores[index]) / 255.0,
                })
            }
            Self::Unsupported(ty) => Err(ClassifyError::UnsupportedOutputType(*ty)),
        }
    }
}

/// Index of the largest score. Ties go to the first occurrence; NaN never wins.
///
/// Returns `None` for an empty or all-NaN slice.
pub fn argmax_f32(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of the largest byte, compared unsigned. Ties go to the first occurrence.
pub fn argmax_u8(scores: &[u8]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}
