//! Token-sequence conventions shared by both decoding strategies.

use dx_model::tokenizer::special::{BACKWARD_START, FORWARD_START};

/// `[BOS] + prompt`: the forward model's input.
pub fn forward_sequence(prompt: &[u32]) -> Vec<u32> {
    let mut tokens = Vec::with_capacity(prompt.len() + 1);
    tokens.push(FORWARD_START);
    tokens.extend_from_slice(prompt);
    tokens
}

/// The backward model's input for a forward sequence: the forward start
/// symbol is dropped and `[EOS]` takes its place.
pub fn backward_sequence(forward: &[u32]) -> Vec<u32> {
    let mut tokens = Vec::with_capacity(forward.len().max(1));
    tokens.push(BACKWARD_START);
    tokens.extend_from_slice(forward.get(1..).unwrap_or(&[]));
    tokens
}

/// Number of tokens after the start symbol.
pub fn content_len(forward: &[u32]) -> usize {
    forward.len().saturating_sub(1)
}

/// `forward + reverse(forward)[1..]`, the list handed to the text renderer
/// so it reads the sequence both ways.
pub fn mirrored(forward: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(forward.len() * 2);
    out.extend_from_slice(forward);
    out.extend(forward.iter().rev().skip(1));
    out
}
