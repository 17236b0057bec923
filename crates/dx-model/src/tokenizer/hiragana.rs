use std::collections::HashMap;

use super::special;

const CHARACTERS: &str = "ぁあぃいぅうぇえぉおかがきぎくぐけげこごさざしじすずせぜそぞただちぢっつづてでとどなにぬねのはばぱひびぴふぶぷへべぺほぼぽまみむめもゃやゅゆょよらりるれろわをんゎゐゑゕゖゔー";

/// Fixed character-level vocabulary shared by the forward and backward models.
///
/// Index layout: the seven special symbols, then one token per hiragana
/// character (plus the long-vowel mark).
pub struct HiraganaVocab {
    /// Printable characters, indexed by `token - special::COUNT`.
    chars: Vec<char>,
    /// Reverse mapping from character to token ID.
    char_to_id: HashMap<char, u32>,
}

impl HiraganaVocab {
    pub fn new() -> Self {
        let chars: Vec<char> = CHARACTERS.chars().collect();
        let char_to_id = chars
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i as u32 + special::COUNT))
            .collect();
        HiraganaVocab { chars, char_to_id }
    }

    /// Number of tokens, special symbols included.
    pub fn len(&self) -> usize {
        special::COUNT as usize + self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Map each character to its token; characters outside the set map to
    /// `[UNK]`.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        text.chars()
            .map(|c| self.char_to_id.get(&c).copied().unwrap_or(special::UNK))
            .collect()
    }

    /// Render tokens as text. Special symbols and out-of-range ids render
    /// as nothing.
    pub fn decode(&self, tokens: &[u32]) -> String {
        tokens.iter().filter_map(|&t| self.char_of(t)).collect()
    }

    /// The character for a token, if it is printable.
    pub fn char_of(&self, token: u32) -> Option<char> {
        let index = token.checked_sub(special::COUNT)?;
        self.chars.get(index as usize).copied()
    }

    /// Display form of a token, special symbols included.
    pub fn token_name(&self, token: u32) -> Option<String> {
        match special::NAMES.get(token as usize) {
            Some(name) => Some(name.to_string()),
            None => self.char_of(token).map(String::from),
        }
    }
}

impl Default for HiraganaVocab {
    fn default() -> Self {
        Self::new()
    }
}
