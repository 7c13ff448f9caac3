//! Series cleaning ahead of model fitting.

use super::DetectError;

/// Finite values of a raw series plus where each one came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedSeries {
    pub values: Vec<f64>,
    /// `index_map[i]` is the position of `values[i]` in the raw series.
    pub index_map: Vec<usize>,
    /// Length of the raw series before cleaning.
    pub original_len: usize,
}

impl SanitizedSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of non-finite samples that were dropped.
    pub fn dropped(&self) -> usize {
        self.original_len - self.values.len()
    }

    /// Translate a clean position back to its raw-series position.
    pub fn original_index(&self, clean_index: usize) -> Option<usize> {
        self.index_map.get(clean_index).copied()
    }
}

/// Drop NaN and infinite samples, keeping relative order.
pub fn sanitize(raw: &[f64]) -> SanitizedSeries {
    let (index_map, values): (Vec<usize>, Vec<f64>) = raw
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i, v))
        .unzip();

    SanitizedSeries {
        values,
        index_map,
        original_len: raw.len(),
    }
}

/// Parse user-edited text ("25000, 30000, 28000 ...") into a raw series.
///
/// Tokens are separated by commas and/or whitespace; empty tokens are
/// skipped. `NaN` and `inf` are accepted as gap markers and left for
/// [`sanitize`] to drop.
pub fn parse_series(text: &str) -> Result<Vec<f64>, DetectError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .enumerate()
        .map(|(position, token)| {
            token.parse::<f64>().map_err(|_| DetectError::InvalidInput {
                position,
                token: token.to_string(),
            })
        })
        .collect()
}
