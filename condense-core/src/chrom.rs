//! Canonical chromosome ordering
//!
//! Chromosome names carry the `chr` prefix. Numbered chromosomes sort by
//! their integer value, the sex and mitochondrial chromosomes are mapped to
//! the numbers following the human autosomes, and every other name sorts
//! lexically after them.

use std::cmp::Ordering;

/// Prefix shared by all canonically ordered chromosome names.
pub const CHROM_PREFIX: &str = "chr";

/// Rank given to the symbolic chromosomes.
const SYMBOLIC_RANKS: &[(&str, u64)] = &[("X", 23), ("Y", 24), ("M", 25), ("MT", 25)];

/// Sort key of a chromosome name.
///
/// Variant order is significant: ranked names come first, then other
/// `chr`-prefixed names, then names without the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChromKey<'a> {
    Ranked(u64),
    Named(&'a str),
    Unprefixed(&'a str),
}

/// Compute the sort key for a chromosome name.
pub fn chrom_key(name: &str) -> ChromKey<'_> {
    let Some(rest) = name.strip_prefix(CHROM_PREFIX) else {
        return ChromKey::Unprefixed(name);
    };

    if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(rank) = rest.parse::<u64>() {
            return ChromKey::Ranked(rank);
        }
    }

    SYMBOLIC_RANKS
        .iter()
        .find(|(symbol, _)| *symbol == rest)
        .map(|&(_, rank)| ChromKey::Ranked(rank))
        .unwrap_or(ChromKey::Named(rest))
}

/// Compare two chromosome names by their canonical key.
pub fn compare_chroms(a: &str, b: &str) -> Ordering {
    chrom_key(a).cmp(&chrom_key(b))
}

/// Sort chromosome names in place (stable for equal keys).
pub fn sort_chroms<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| compare_chroms(a.as_ref(), b.as_ref()));
}
