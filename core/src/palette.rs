//! Deterministic tag-to-color assignment.
//!
//! A tag's color doubles as a stable identifier readers associate with it, so
//! the mapping has to come out the same across clients and across releases.
//! The hash therefore commits to 32-bit two's-complement arithmetic rather
//! than whatever width the platform prefers.

/// Number of colors in the badge palette.
pub const PALETTE_SIZE: usize = 9;

/// One of the fixed badge colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteSlot {
    Blue,
    Orange,
    Green,
    Red,
    Turquoise,
    Gray,
    Yellow,
    Mint,
    Pink,
}

impl PaletteSlot {
    /// All slots, in hash-index order.
    pub const ALL: [PaletteSlot; PALETTE_SIZE] = [
        PaletteSlot::Blue,
        PaletteSlot::Orange,
        PaletteSlot::Green,
        PaletteSlot::Red,
        PaletteSlot::Turquoise,
        PaletteSlot::Gray,
        PaletteSlot::Yellow,
        PaletteSlot::Mint,
        PaletteSlot::Pink,
    ];

    /// Position of this slot within [`Self::ALL`].
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Theme token the host stylesheet resolves to an actual color.
    pub fn theme_token(self) -> &'static str {
        match self {
            PaletteSlot::Blue => "attestationBlue",
            PaletteSlot::Orange => "attestationOrange",
            PaletteSlot::Green => "attestationGreen",
            PaletteSlot::Red => "attestationRed",
            PaletteSlot::Turquoise => "attestationTurquoise",
            PaletteSlot::Gray => "attestationGray",
            PaletteSlot::Yellow => "attestationYellow",
            PaletteSlot::Mint => "attestationMint",
            PaletteSlot::Pink => "attestationPink",
        }
    }
}

/// Maps a tag to its palette slot.
pub fn slot(tag: &str) -> PaletteSlot {
    PaletteSlot::ALL[reduce(hash_code(tag))]
}

/// 32-bit rotate-multiply string hash: `hash = hash * 31 + unit`, wrapping.
///
/// Each character contributes its leading UTF-16 code unit, and the
/// accumulator wraps in `i32` on every step. Both details are part of the
/// cross-client contract.
fn hash_code(tag: &str) -> i32 {
    let mut hash: i32 = 0;
    let mut buf = [0u16; 2];
    for ch in tag.chars() {
        let unit = ch.encode_utf16(&mut buf)[0];
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    hash
}

/// Folds a hash into a palette index.
///
/// `unsigned_abs` keeps `i32::MIN` well-defined: it maps to 2147483648
/// instead of wrapping back to a negative value.
fn reduce(hash: i32) -> usize {
    (hash.unsigned_abs() as usize) % PALETTE_SIZE
}
