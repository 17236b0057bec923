/// Temperatures below this are treated as zero: sampling degenerates to
/// taking the highest scores in order.
pub const GREEDY_TEMPERATURE: f32 = 0.001;

/// Softmax of `scores / temperature`, computed against the maximum score for
/// numerical stability.
///
/// `-inf` scores get zero weight. If no score is finite above `-inf` every
/// weight is zero.
pub fn softmax_with_temperature(scores: &[f32], temperature: f32) -> Vec<f32> {
    let temp = temperature.max(GREEDY_TEMPERATURE);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; scores.len()];
    }

    let exps: Vec<f32> = scores.iter().map(|&s| ((s - max) / temp).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}
