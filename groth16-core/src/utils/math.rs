pub trait Math {
    fn pow2(self) -> usize;
    fn log_2(self) -> usize;
}

impl Math for usize {
    #[inline]
    fn pow2(self) -> usize {
        let base: usize = 2;
        base.pow(self as u32)
    }

    /// Ceiling log2. `0.log_2()` is 0.
    fn log_2(self) -> usize {
        if self == 0 {
            return 0;
        }

        if self.is_power_of_two() {
            (1usize.leading_zeros() - self.leading_zeros()) as usize
        } else {
            (0usize.leading_zeros() - self.leading_zeros()) as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_2_rounds_up() {
        assert_eq!(1usize.log_2(), 0);
        assert_eq!(2usize.log_2(), 1);
        assert_eq!(5usize.log_2(), 3);
        assert_eq!(8usize.log_2(), 3);
        assert_eq!(3usize.pow2(), 8);
    }
}
