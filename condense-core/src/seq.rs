//! Nucleotide sequence helpers.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeqError {
    #[error("Invalid nucleotide '{base}' at offset {offset}")]
    InvalidBase { base: char, offset: usize },
}

fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'T' => Some(b'A'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'N' => Some(b'N'),
        _ => None,
    }
}

/// Reverse complement of an upper-case DNA sequence (`ACGTN`).
pub fn reverse_complement(seq: &[u8]) -> Result<Vec<u8>, SeqError> {
    seq.iter()
        .enumerate()
        .rev()
        .map(|(offset, &base)| {
            complement(base).ok_or(SeqError::InvalidBase {
                base: base as char,
                offset,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ATCGN").unwrap(), b"NCGAT".to_vec());
        assert_eq!(reverse_complement(b"").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_involution() {
        let seq = b"GATTACANNCG";
        let twice = reverse_complement(&reverse_complement(seq).unwrap()).unwrap();
        assert_eq!(twice, seq.to_vec());
    }

    #[test]
    fn test_rejects_lowercase_and_iupac() {
        assert_eq!(
            reverse_complement(b"ACgT"),
            Err(SeqError::InvalidBase { base: 'g', offset: 2 })
        );
        assert!(reverse_complement(b"ACR").is_err());
    }
}
