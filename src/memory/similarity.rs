/*!
 * Similarity scoring for fuzzy translation memory lookups.
 *
 * The score is the normalized indel similarity of two strings:
 * `2 * LCS(a, b) / (|a| + |b|)`, where LCS is the longest common
 * subsequence of characters. It is 1.0 for identical strings, 0.0 for
 * strings without a common character, and only counts insertions and
 * deletions, so added punctuation costs one unit per character instead of
 * two as a substitution would.
 *
 * Comparison is case-insensitive and works on `char`s, not bytes.
 */

/// Similarity between two strings in [0.0, 1.0]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.to_lowercase().chars().collect();
    let b_chars: Vec<char> = b.to_lowercase().chars().collect();
    similarity_chars(&a_chars, &b_chars)
}

/// Similarity over pre-lowercased character slices
pub fn similarity_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    (2 * lcs_length(a, b)) as f64 / total as f64
}

/// Highest similarity two strings of these lengths could reach
///
/// Used to skip candidates before running the quadratic LCS.
pub fn length_bound(a_len: usize, b_len: usize) -> f64 {
    let total = a_len + b_len;
    if total == 0 {
        return 1.0;
    }
    (2 * a_len.min(b_len)) as f64 / total as f64
}

/// Length of the longest common subsequence
fn lcs_length(a: &[char], b: &[char]) -> usize {
    // Keep the shorter string in the row for O(min(n, m)) memory
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    let mut prev_row: Vec<usize> = vec![0; short.len() + 1];
    let mut curr_row: Vec<usize> = vec![0; short.len() + 1];

    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr_row[j + 1] = if lc == sc {
                prev_row[j] + 1
            } else {
                prev_row[j + 1].max(curr_row[j])
            };
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[short.len()]
}
