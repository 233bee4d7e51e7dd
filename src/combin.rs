//! Lazy enumeration of all size-≤k subsets of an n-element edge set,
//! splittable into independent streams for parallel consumption.
//!
//! The global order enumerates subset sizes ascending (the empty subset
//! first), and index vectors lexicographically within a size. Stream `i` of
//! a `split` yields the global sequence decimated by rank — ranks `i`,
//! `i + split`, `i + 2·split`, … — so the union over all streams is exactly
//! the full sequence, no subset is produced twice, and re-splitting the same
//! inputs reproduces the same multiset.

/// Advance `v` to the next index vector; returns false once the sequence is
/// exhausted. `v` is a strictly increasing vector of indices into `0..n`.
fn advance(v: &mut Vec<usize>, n: usize, k: usize) -> bool {
    let s = v.len();
    let mut i = s;
    while i > 0 {
        i -= 1;
        if v[i] < n - s + i {
            v[i] += 1;
            for j in i + 1..s {
                v[j] = v[j - 1] + 1;
            }
            return true;
        }
    }
    // every vector of the current size is spent; grow by one
    if s < k && s < n {
        *v = (0..=s).collect();
        return true;
    }
    false
}

/// One independent generator stream. Candidates are delivered by
/// `get_next` and only consumed by `confirm`, so an unconfirmed candidate
/// is redelivered.
pub struct CombinIterator {
    n: usize,
    k: usize,
    step: usize,
    current: Option<Vec<usize>>,
}

impl CombinIterator {
    fn with_offset(n: usize, k: usize, offset: usize, step: usize) -> Self {
        let mut v = Vec::new();
        let mut alive = true;
        for _ in 0..offset {
            if !advance(&mut v, n, k) {
                alive = false;
                break;
            }
        }
        CombinIterator {
            n,
            k,
            step,
            current: if alive { Some(v) } else { None },
        }
    }

    pub fn has_next(&self) -> bool {
        self.current.is_some()
    }

    pub fn get_next(&self) -> &[usize] {
        self.current
            .as_ref()
            .expect("get_next called on an exhausted stream")
    }

    pub fn confirm(&mut self) {
        for _ in 0..self.step {
            match self.current.as_mut() {
                Some(v) => {
                    if !advance(v, self.n, self.k) {
                        self.current = None;
                        return;
                    }
                }
                None => return,
            }
        }
    }
}

/// Split the enumeration of all size-≤k subsets of `n` elements into
/// `split` disjoint streams.
pub fn split_combin(n: usize, k: usize, split: usize) -> Vec<CombinIterator> {
    assert!(split >= 1, "need at least one stream");
    (0..split)
        .map(|i| CombinIterator::with_offset(n, k, i, split))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut streams: Vec<CombinIterator>) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        for gen in &mut streams {
            while gen.has_next() {
                out.push(gen.get_next().to_vec());
                gen.confirm();
            }
        }
        out
    }

    fn binomial(n: usize, r: usize) -> usize {
        if r > n {
            return 0;
        }
        (0..r).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn test_counts_all_sizes() {
        for &(n, k) in &[(5, 2), (6, 3), (4, 4), (3, 5), (0, 2)] {
            let expected: usize = (0..=k.min(n)).map(|r| binomial(n, r)).sum();
            for split in 1..=4 {
                let subsets = drain(split_combin(n, k, split));
                assert_eq!(
                    subsets.len(),
                    expected,
                    "n={} k={} split={}",
                    n,
                    k,
                    split
                );
            }
        }
    }

    #[test]
    fn test_split_multiset_matches_sequential() {
        for split in 2..=5 {
            let mut seq = drain(split_combin(7, 3, 1));
            let mut par = drain(split_combin(7, 3, split));
            seq.sort();
            par.sort();
            assert_eq!(seq, par, "split={}", split);
        }
    }

    #[test]
    fn test_no_duplicates() {
        let mut all = drain(split_combin(6, 3, 4));
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn test_restartable() {
        let a = drain(split_combin(6, 2, 3));
        let b = drain(split_combin(6, 2, 3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unconfirmed_candidate_redelivered() {
        let mut streams = split_combin(4, 2, 1);
        let gen = &mut streams[0];
        assert!(gen.has_next());
        let first = gen.get_next().to_vec();
        assert_eq!(first, gen.get_next().to_vec());
        gen.confirm();
        assert_ne!(first, gen.get_next().to_vec());
    }
}
