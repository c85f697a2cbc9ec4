/// Deterministic xorshift32 generator used for level generation and spawns.
#[derive(Clone, Debug)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Create a generator. A zero seed is replaced with a random non-zero one,
    /// since xorshift never leaves the all-zero state.
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 {
            fastrand::u32(1..=u32::MAX)
        } else {
            seed
        };
        Self { state }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform integer in `[a, b]` (inclusive). Swapped bounds are accepted.
    pub fn range(&mut self, a: i32, b: i32) -> i32 {
        let (lo, hi) = if b < a { (b, a) } else { (a, b) };
        let span = (hi as i64 - lo as i64 + 1) as u64;
        lo + (self.next_u32() as u64 % span) as i32
    }

    pub fn coin(&mut self) -> bool {
        self.next_u32() & 1 == 1
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range(0, i as i32) as usize;
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = XorShift32::new(1234);
        let mut b = XorShift32::new(1234);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn zero_seed_is_replaced() {
        let rng = XorShift32::new(0);
        assert_ne!(rng.state(), 0);
    }

    #[test]
    fn range_stays_inclusive() {
        let mut rng = XorShift32::new(99);
        for _ in 0..1000 {
            let v = rng.range(3, 7);
            assert!((3..=7).contains(&v));
        }
        assert_eq!(rng.range(5, 5), 5);
        let v = rng.range(9, 2);
        assert!((2..=9).contains(&v));
    }

    #[test]
    fn shuffle_keeps_elements() {
        let mut rng = XorShift32::new(7);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }
}
