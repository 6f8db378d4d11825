use crate::errors::SortForestError;

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), SortForestError> {
    validate_float_parameter(value, 0.0, f64::INFINITY, parameter)
}

pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), SortForestError> {
    if value.is_nan() || value < min || max < value {
        let ex_msg = format!("real value within range {} and {}", min, max);
        Err(SortForestError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Midpoint between two neighbouring sorted values `lower < upper`, used as a split threshold.
///
/// The result always satisfies `lower <= t < upper`, so `value <= t` separates the two
/// values exactly. When no such point lies strictly between them (adjacent floats,
/// infinities) the threshold is `lower` itself.
#[inline]
pub fn midpoint(lower: f64, upper: f64) -> f64 {
    let gap = upper - lower;
    let mid = if gap.is_finite() {
        lower + gap / 2.0
    } else {
        lower / 2.0 + upper / 2.0
    };
    if mid.is_finite() && lower <= mid && mid < upper {
        mid
    } else {
        lower
    }
}

/// Mark `ids` in a mask of length `n`. Returns the mask and the number of distinct ids marked.
pub fn id_mask(ids: &[usize], n: usize) -> (Vec<bool>, usize) {
    let mut mask = vec![false; n];
    let mut count = 0;
    for &i in ids {
        if !mask[i] {
            mask[i] = true;
            count += 1;
        }
    }
    (mask, count)
}

/// Stable partition of `index` so that ids with `is_yes[id]` come first,
/// keeping relative order on both sides. `scratch` is reused between calls.
/// Returns the number of yes ids.
pub fn stable_partition(index: &mut [usize], is_yes: &[bool], scratch: &mut Vec<usize>) -> usize {
    scratch.clear();
    let mut yes = 0;
    for i in 0..index.len() {
        let id = index[i];
        if is_yes[id] {
            index[yes] = id;
            yes += 1;
        } else {
            scratch.push(id);
        }
    }
    index[yes..].copy_from_slice(scratch);
    yes
}
