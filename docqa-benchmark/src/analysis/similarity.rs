//! Answer-key similarity scoring
//!
//! Uses the Ratcliff/Obershelp "gestalt" matching ratio: recursively find the longest
//! common block, then match the pieces on either side. `ratio = 2 * matched / total`.

use std::collections::HashMap;

/// Sequences at least this long get their most frequent elements excluded from
/// block seeding, the same heuristic text diff tools use to stay near-linear.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Similarity of two strings in `[0, 1]`, compared character by character
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = SequenceMatcher::new(&a, &b).matched_len();
    2.0 * matched as f64 / total as f64
}

/// Case-insensitive similarity of one produced answer to its key
pub fn answer_similarity(produced: &str, expected: &str) -> f64 {
    similarity_ratio(&produced.to_lowercase(), &expected.to_lowercase())
}

/// Mean pairwise similarity over `min(len(produced), len(expected))` positions.
///
/// Unmatched trailing answers or keys are ignored; with no pairs at all the score
/// is `0.0`.
pub fn score<P: AsRef<str>, E: AsRef<str>>(produced: &[P], expected: &[E]) -> f64 {
    let ratios: Vec<f64> = produced
        .iter()
        .zip(expected)
        .map(|(p, e)| answer_similarity(p.as_ref(), e.as_ref()))
        .collect();

    if ratios.is_empty() {
        return 0.0;
    }
    (ratios.iter().sum::<f64>() / ratios.len() as f64).clamp(0.0, 1.0)
}

struct SequenceMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each element of `b`, ascending, popular elements removed
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> SequenceMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }

        if b.len() >= AUTOJUNK_MIN_LEN {
            let threshold = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= threshold);
        }

        Self { a, b, b2j }
    }

    /// Longest matching block in `a[alo..ahi]` x `b[blo..bhi]` as `(i, j, size)`
    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (a, b) = (self.a, self.b);
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // j2len[j] = length of the match ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| j2len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        // Extend across elements dropped from b2j as popular
        while best_i > alo && best_j > blo && a[best_i - 1] == b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && a[best_i + best_size] == b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    /// Total length of all matching blocks
    fn matched_len(&self) -> usize {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}
