//! Deterministic random numbers.
//!
//! Stories compiled for the reference runtime expect `rnd`, shuffles and
//! `LIST_RANDOM` to follow the sequence of Knuth's subtractive generator as
//! implemented by .NET's seeded `System.Random`. Reproducing it keeps
//! playthroughs and saved seeds portable between runtimes.

const MBIG: i32 = i32::MAX;
const MSEED: i32 = 161_803_398;

pub struct SubtractiveRng {
    seed_array: [i32; 56],
    inext: usize,
    inextp: usize,
}

impl SubtractiveRng {
    pub fn new(seed: i32) -> Self {
        let subtraction = if seed == i32::MIN { i32::MAX } else { seed.abs() };
        let mut seed_array = [0i32; 56];
        let mut mj = MSEED.wrapping_sub(subtraction);
        seed_array[55] = mj;
        let mut mk: i32 = 1;
        for i in 1..55 {
            let ii = (21 * i) % 55;
            seed_array[ii] = mk;
            mk = mj.wrapping_sub(mk);
            if mk < 0 {
                mk = mk.wrapping_add(MBIG);
            }
            mj = seed_array[ii];
        }
        for _ in 1..5 {
            for i in 1..56 {
                seed_array[i] = seed_array[i].wrapping_sub(seed_array[1 + (i + 30) % 55]);
                if seed_array[i] < 0 {
                    seed_array[i] = seed_array[i].wrapping_add(MBIG);
                }
            }
        }
        Self {
            seed_array,
            inext: 0,
            inextp: 21,
        }
    }

    /// Next value in `0..i32::MAX`.
    pub fn next_int(&mut self) -> i32 {
        let mut inext = self.inext + 1;
        if inext >= 56 {
            inext = 1;
        }
        let mut inextp = self.inextp + 1;
        if inextp >= 56 {
            inextp = 1;
        }
        let mut value = self.seed_array[inext].wrapping_sub(self.seed_array[inextp]);
        if value == MBIG {
            value -= 1;
        }
        if value < 0 {
            value = value.wrapping_add(MBIG);
        }
        self.seed_array[inext] = value;
        self.inext = inext;
        self.inextp = inextp;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SubtractiveRng::new(42);
        let mut b = SubtractiveRng::new(42);
        for _ in 0..10 {
            assert_eq!(a.next_int(), b.next_int());
        }
    }

    #[test]
    fn values_are_non_negative() {
        let mut rng = SubtractiveRng::new(-7);
        for _ in 0..1000 {
            assert!(rng.next_int() >= 0);
        }
    }

    #[test]
    fn extreme_seeds_do_not_overflow() {
        SubtractiveRng::new(i32::MIN).next_int();
        SubtractiveRng::new(i32::MAX).next_int();
    }
}
