use std::collections::HashMap;

/// Forbids repeating an exact trigram.
///
/// Maps the pair of the two most recent tokens to every token already chosen
/// right after that pair. When the pair comes round again those tokens are
/// excluded, so no `(a, b, c)` trigram is emitted twice.
///
/// Tokens are always recorded under the pair that preceded them, in greedy
/// and beam decoding alike.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrigramBlocker {
    table: HashMap<(u32, u32), Vec<u32>>,
}

impl TrigramBlocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-filled with every trigram already in `tokens`.
    pub fn seeded(tokens: &[u32]) -> Self {
        let mut blocker = Self::new();
        blocker.seed(tokens);
        blocker
    }

    /// Record every trigram of `tokens`.
    pub fn seed(&mut self, tokens: &[u32]) {
        for window in tokens.windows(3) {
            self.insert((window[0], window[1]), window[2]);
        }
    }

    /// Tokens that may not follow `tokens` (empty with fewer than two tokens).
    pub fn blocked(&self, tokens: &[u32]) -> &[u32] {
        match last_pair(tokens) {
            Some(pair) => self.table.get(&pair).map(Vec::as_slice).unwrap_or(&[]),
            None => &[],
        }
    }

    /// Record that `next` was chosen to follow `tokens`.
    ///
    /// `tokens` is the sequence before `next` is appended.
    pub fn record(&mut self, tokens: &[u32], next: u32) {
        if let Some(pair) = last_pair(tokens) {
            self.insert(pair, next);
        }
    }

    /// Number of distinct pairs with recorded successors.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    fn insert(&mut self, pair: (u32, u32), next: u32) {
        let successors = self.table.entry(pair).or_default();
        if !successors.contains(&next) {
            successors.push(next);
        }
    }
}

fn last_pair(tokens: &[u32]) -> Option<(u32, u32)> {
    match tokens {
        [.., a, b] => Some((*a, *b)),
        _ => None,
    }
}
