use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The effective identifier of a block: a 32-byte opaque hash. Treated as
/// unordered except for the trivial byte-lexicographic `Ord` impl needed to
/// put it in a `BTreeMap`/use as a tie-breaker key where the spec calls for
/// one (it never does for fork-choice decisions, only for `HashMap` storage
/// and test fixtures).
///
/// `BlockId::zero()` is never a real block; it is reserved as a sentinel
/// on the rare paths that need "no parent" as a plain value instead of an
/// `Option`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub [u8; 32]);

impl BlockId {
    pub fn zero() -> Self {
        BlockId([0; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Builds a `BlockId` from a single repeated byte. Handy for readable
    /// test fixtures (`BlockId::repeat(b'A')`).
    pub fn repeat(byte: u8) -> Self {
        BlockId([byte; 32])
    }

    /// Mints a pseudo-random block id from the given RNG. Used by the
    /// simulation driver when proposing new blocks.
    pub fn random(rng: &mut impl Rng) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        BlockId(bytes)
    }
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId::zero()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(self.0))
    }
}

#[derive(Debug)]
pub struct ParseBlockIdError(hex::FromHexError);

impl fmt::Display for ParseBlockIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid block id: {}", self.0)
    }
}

impl FromStr for BlockId {
    type Err = ParseBlockIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(ParseBlockIdError)?;
        Ok(BlockId(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default() {
        assert_eq!(BlockId::default(), BlockId::zero());
        assert!(BlockId::zero().is_zero());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = BlockId::repeat(0xab);
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(BlockId::from_str(&s).unwrap(), id);
    }
}
