//! Lazy index permutations and combinations in lexicographic order.

/// All `r`-length permutations of `0..n`, lexicographic
#[derive(Debug, Clone)]
pub struct Permutations {
    n: usize,
    r: usize,
    indices: Vec<usize>,
    cycles: Vec<usize>,
    first: bool,
    done: bool,
}

impl Permutations {
    /// Permutations of length `r` drawn from `0..n`
    #[must_use]
    pub fn new(n: usize, r: usize) -> Self {
        Self {
            n,
            r,
            indices: (0..n).collect(),
            cycles: if r <= n {
                (0..r).map(|i| n - i).collect()
            } else {
                Vec::new()
            },
            first: true,
            done: r > n,
        }
    }
}

impl Iterator for Permutations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices[..self.r].to_vec());
        }
        if self.n == 0 {
            self.done = true;
            return None;
        }

        for i in (0..self.r).rev() {
            self.cycles[i] -= 1;
            if self.cycles[i] == 0 {
                self.indices[i..].rotate_left(1);
                self.cycles[i] = self.n - i;
            } else {
                let j = self.cycles[i];
                self.indices.swap(i, self.n - j);
                return Some(self.indices[..self.r].to_vec());
            }
        }

        self.done = true;
        None
    }
}

/// All `r`-element combinations of `0..n`, lexicographic
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    r: usize,
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

impl Combinations {
    /// Combinations of size `r` drawn from `0..n`
    #[must_use]
    pub fn new(n: usize, r: usize) -> Self {
        Self {
            n,
            r,
            indices: (0..r).collect(),
            first: true,
            done: r > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }

        let Some(i) = (0..self.r)
            .rev()
            .find(|&i| self.indices[i] != i + self.n - self.r)
        else {
            self.done = true;
            return None;
        };

        self.indices[i] += 1;
        for j in i + 1..self.r {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// Permutations of every length `0..=n`, shortest first
pub fn all_permutations(n: usize) -> impl Iterator<Item = Vec<usize>> {
    (0..=n).flat_map(move |r| Permutations::new(n, r))
}

/// Combinations of every size `0..=n`, smallest first
pub fn all_combinations(n: usize) -> impl Iterator<Item = Vec<usize>> {
    (0..=n).flat_map(move |r| Combinations::new(n, r))
}
