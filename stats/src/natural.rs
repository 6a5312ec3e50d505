#![allow(missing_docs)]

use itertools::Itertools;
use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(s: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (is_digit, run) in &s.chars().chunk_by(char::is_ascii_digit) {
        let len: usize = run.map(char::len_utf8).sum();
        let text = &s[start..start + len];
        out.push(if is_digit {
            Chunk::Digits(text)
        } else {
            Chunk::Text(text)
        });
        start += len;
    }
    out
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two strings so that embedded numbers sort numerically:
/// `"cluster2" < "cluster10"`. Digit runs sort before text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (ca, cb) = (chunks(a), chunks(b));
    for (x, y) in ca.iter().zip(cb.iter()) {
        let ord = match (x, y) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    ca.len().cmp(&cb.len())
}

/// Sort in place with [`natural_cmp`].
pub fn natural_sort<S: AsRef<str>>(values: &mut [S]) {
    values.sort_by(|a, b| natural_cmp(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks() {
        assert_eq!(
            chunks("ab12c"),
            vec![Chunk::Text("ab"), Chunk::Digits("12"), Chunk::Text("c")]
        );
        assert!(chunks("").is_empty());
    }

    #[test]
    fn test_natural_sort() {
        let mut groups = vec!["10", "2", "1", "b", "a10", "a2"];
        natural_sort(&mut groups);
        assert_eq!(groups, vec!["1", "2", "10", "a2", "a10", "b"]);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(natural_cmp("007", "7"), Ordering::Greater);
        assert_eq!(natural_cmp("cell_2", "cell_02"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
    }
}
