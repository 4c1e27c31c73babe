use ark_ff::{FftField, Field};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};

use crate::utils::math::Math;

/// Radix-2 evaluation domain over which the QAP is interpolated. Constraint row `i`
/// is evaluated at `ω^i`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FftDomain<F: FftField> {
    inner: Radix2EvaluationDomain<F>,
}

impl<F: FftField> FftDomain<F> {
    /// Smallest power-of-two domain holding `rows` evaluations, or `None` when the
    /// field's two-adicity is too small.
    pub fn new(rows: usize) -> Option<Self> {
        let inner = Radix2EvaluationDomain::new(rows.max(1))?;
        Some(Self { inner })
    }

    /// Rebuilds a domain from its serialized size, which must be an exact power of two.
    pub fn from_size(size: usize) -> Option<Self> {
        if !size.is_power_of_two() {
            return None;
        }
        let domain = Self::new(size)?;
        (domain.size() == size).then_some(domain)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    #[inline]
    pub fn log_size(&self) -> usize {
        self.size().log_2()
    }

    #[inline]
    pub fn group_gen(&self) -> F {
        self.inner.group_gen()
    }

    #[inline]
    pub fn radix2(&self) -> &Radix2EvaluationDomain<F> {
        &self.inner
    }

    /// Coset `g·H` used for the quotient computation, `g` the field's multiplicative
    /// generator.
    pub fn coset_generator(&self) -> F {
        F::GENERATOR
    }

    pub fn coset(&self, offset: F) -> Option<Radix2EvaluationDomain<F>> {
        self.inner.get_coset(offset)
    }

    /// `1 / Z_H(g) = 1 / (g^n - 1)`. On the coset `g·H` the vanishing polynomial is
    /// constant, so dividing by it is a scalar multiplication.
    pub fn vanishing_denominator(&self, coset_generator: F) -> Option<F> {
        (coset_generator.pow([self.size() as u64]) - F::ONE).inverse()
    }

    /// `Z_H(τ) = τ^n - 1`.
    pub fn evaluate_vanishing_polynomial(&self, tau: F) -> F {
        self.inner.evaluate_vanishing_polynomial(tau)
    }

    /// All `n` Lagrange basis polynomials evaluated at `τ`.
    pub fn lagrange_coefficients(&self, tau: F) -> Vec<F> {
        self.inner.evaluate_all_lagrange_coefficients(tau)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ff::{One, UniformRand, Zero};

    #[test]
    fn domain_rounds_up_to_power_of_two() {
        let domain = FftDomain::<Fr>::new(5).unwrap();
        assert_eq!(domain.size(), 8);
        assert_eq!(domain.log_size(), 3);
        assert!(FftDomain::<Fr>::from_size(6).is_none());
        assert_eq!(FftDomain::<Fr>::from_size(8), Some(domain));
    }

    #[test]
    fn vanishing_denominator_inverts_coset_vanishing() {
        let domain = FftDomain::<Fr>::new(16).unwrap();
        let g = domain.coset_generator();
        let den = domain.vanishing_denominator(g).unwrap();
        assert_eq!(den * domain.evaluate_vanishing_polynomial(g), Fr::one());
    }

    #[test]
    fn lagrange_coefficients_sum_to_one() {
        let mut rng = ark_std::test_rng();
        let domain = FftDomain::<Fr>::new(8).unwrap();
        let tau = Fr::rand(&mut rng);
        let sum: Fr = domain.lagrange_coefficients(tau).iter().sum();
        assert_eq!(sum, Fr::one());
        assert!(!domain.evaluate_vanishing_polynomial(tau).is_zero());
    }
}
