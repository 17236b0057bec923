pub mod hiragana;

pub use hiragana::HiraganaVocab;

/// Special symbols occupying the lowest vocabulary indices.
pub mod special {
    pub const CLS: u32 = 0;
    pub const SEP: u32 = 1;
    pub const BOS: u32 = 2;
    pub const MASK: u32 = 3;
    pub const PAD: u32 = 4;
    pub const EOS: u32 = 5;
    pub const UNK: u32 = 6;

    /// Number of special symbols; tokens below this render as nothing.
    pub const COUNT: u32 = 7;

    /// Start symbol of the forward model's input.
    pub const FORWARD_START: u32 = BOS;
    /// Start symbol of the backward model's input.
    pub const BACKWARD_START: u32 = EOS;

    pub const NAMES: [&str; COUNT as usize] =
        ["[CLS]", "[SEP]", "[BOS]", "[MASK]", "[PAD]", "[EOS]", "[UNK]"];
}
