use ndarray::Array1;

/// Numerically stable softmax; the maximum logit is subtracted before exponentiation.
pub(crate) fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    if logits.is_empty() {
        return Array1::zeros(0);
    }
    let max = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    let exp = logits.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value; ties go to the lowest index.
pub(crate) fn argmax(values: &Array1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Whether every value is a probability, allowing for float rounding.
pub(crate) fn is_probability_vector(values: &Array1<f32>) -> bool {
    const TOLERANCE: f32 = 1e-4;
    values.iter().all(|&p| (-TOLERANCE..=1.0 + TOLERANCE).contains(&p))
}
