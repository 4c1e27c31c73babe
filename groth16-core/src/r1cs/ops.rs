//! Defines the Linear Combination (LC) object and associated operations.
//! A LinearCombination is a vector of Terms, where each Term is a pair of a Variable and a coefficient.

use ark_ff::Field;
use std::fmt::Debug;

/// Circuit variable as the builder hands it out. Indices are local to their kind and
/// become wire indices once the builder fixes the layout `[one | public | secret | internal]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    One,
    Public(usize),
    Secret(usize),
    Internal(usize),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Term<F: Field>(pub Variable, pub F);

/// Linear Combination of terms.
#[derive(Clone, PartialEq, Eq)]
pub struct LC<F: Field>(Vec<Term<F>>);

impl<F: Field> LC<F> {
    /// Merges repeated variables and drops zero coefficients.
    pub fn new(terms: Vec<Term<F>>) -> Self {
        let mut combined: Vec<Term<F>> = Vec::with_capacity(terms.len());
        for term in terms {
            if let Some(existing) = combined.iter_mut().find(|t| t.0 == term.0) {
                existing.1 += term.1;
            } else {
                combined.push(term);
            }
        }
        combined.retain(|t| !t.1.is_zero());
        LC(combined)
    }

    pub fn zero() -> Self {
        LC(vec![])
    }

    pub fn constant(value: F) -> Self {
        LC::new(vec![Term(Variable::One, value)])
    }

    pub fn terms(&self) -> &[Term<F>] {
        &self.0
    }

    pub fn num_terms(&self) -> usize {
        self.0.len()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluates against an assignment `value_of` for every variable.
    pub fn evaluate(&self, value_of: impl Fn(Variable) -> F) -> F {
        self.0
            .iter()
            .map(|term| value_of(term.0) * term.1)
            .sum()
    }

    pub fn scale(self, factor: F) -> Self {
        LC::new(
            self.0
                .into_iter()
                .map(|term| Term(term.0, term.1 * factor))
                .collect(),
        )
    }
}

impl<F: Field> Debug for LC<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LC(")?;
        for (index, term) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{:?}", term)?;
        }
        write!(f, ")")
    }
}

impl<F: Field> Debug for Term<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{:?}", self.1, self.0)
    }
}

// Arithmetic for LC

impl<F: Field> std::ops::Add for LC<F> {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        let mut terms = self.0;
        terms.extend(other.0);
        LC::new(terms)
    }
}

impl<F: Field> std::ops::Neg for LC<F> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        LC(self.0.into_iter().map(|term| -term).collect())
    }
}

impl<F: Field> std::ops::Sub for LC<F> {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self + (-other)
    }
}

impl<F: Field> std::ops::Add<Variable> for LC<F> {
    type Output = Self;

    fn add(self, other: Variable) -> Self::Output {
        self + LC::from(other)
    }
}

impl<F: Field> std::ops::Sub<Variable> for LC<F> {
    type Output = Self;

    fn sub(self, other: Variable) -> Self::Output {
        self - LC::from(other)
    }
}

impl<F: Field> std::ops::Add<Term<F>> for LC<F> {
    type Output = Self;

    fn add(self, other: Term<F>) -> Self::Output {
        self + LC::from(other)
    }
}

impl<F: Field> std::ops::Mul<F> for LC<F> {
    type Output = Self;

    fn mul(self, other: F) -> Self::Output {
        self.scale(other)
    }
}

// Arithmetic for Term<F>

impl<F: Field> std::ops::Neg for Term<F> {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Term(self.0, -self.1)
    }
}

impl<F: Field> std::ops::Add for Term<F> {
    type Output = LC<F>;

    fn add(self, other: Self) -> Self::Output {
        LC::new(vec![self, other])
    }
}

impl<F: Field> std::ops::Sub for Term<F> {
    type Output = LC<F>;

    fn sub(self, other: Self) -> Self::Output {
        LC::new(vec![self, -other])
    }
}

// Arithmetic for Variable

impl std::ops::Add for Variable {
    type Output = VariableSum;

    fn add(self, other: Self) -> Self::Output {
        VariableSum(vec![(self, true), (other, true)])
    }
}

impl std::ops::Sub for Variable {
    type Output = VariableSum;

    fn sub(self, other: Self) -> Self::Output {
        VariableSum(vec![(self, true), (other, false)])
    }
}

impl<F: Field> std::ops::Mul<F> for Variable {
    type Output = Term<F>;

    fn mul(self, other: F) -> Self::Output {
        Term(self, other)
    }
}

/// `a + b` / `a - b` over bare variables, before a field is known. Converts into
/// `LC<F>` for any `F`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSum(Vec<(Variable, bool)>);

impl std::ops::Add<Variable> for VariableSum {
    type Output = VariableSum;

    fn add(mut self, other: Variable) -> Self::Output {
        self.0.push((other, true));
        self
    }
}

impl std::ops::Sub<Variable> for VariableSum {
    type Output = VariableSum;

    fn sub(mut self, other: Variable) -> Self::Output {
        self.0.push((other, false));
        self
    }
}

// Into<LC<F>>

impl<F: Field> From<Variable> for LC<F> {
    fn from(val: Variable) -> Self {
        LC::new(vec![Term(val, F::ONE)])
    }
}

impl<F: Field> From<Term<F>> for LC<F> {
    fn from(val: Term<F>) -> Self {
        LC::new(vec![val])
    }
}

impl<F: Field> From<Vec<Term<F>>> for LC<F> {
    fn from(val: Vec<Term<F>>) -> Self {
        LC::new(val)
    }
}

impl<F: Field> From<VariableSum> for LC<F> {
    fn from(val: VariableSum) -> Self {
        LC::new(
            val.0
                .into_iter()
                .map(|(v, positive)| Term(v, if positive { F::ONE } else { -F::ONE }))
                .collect(),
        )
    }
}

impl<F: Field> From<&LC<F>> for LC<F> {
    fn from(val: &LC<F>) -> Self {
        val.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn combining_merges_and_cancels() {
        let x = Variable::Secret(0);
        let y = Variable::Public(1);
        let lc: LC<Fr> = LC::from(x + y) + x * Fr::from(2u64) - y;
        assert_eq!(lc.terms(), &[Term(x, Fr::from(3u64))]);
        assert!((LC::<Fr>::from(x) - x).is_zero());
    }

    #[test]
    fn evaluate() {
        let x = Variable::Secret(0);
        let lc: LC<Fr> = LC::from(x * Fr::from(4u64)) + LC::constant(Fr::from(1u64));
        let value = lc.evaluate(|v| match v {
            Variable::One => Fr::from(1u64),
            _ => Fr::from(5u64),
        });
        assert_eq!(value, Fr::from(21u64));
    }
}
