//! Shamir polynomials and Feldman commitment arithmetic
//!
//! The curve arithmetic itself comes from k256; this module provides the
//! secret-sharing layer on top: random polynomial generation, evaluation at
//! participant indices, the public commitment evaluation used to verify
//! received shares, and Lagrange interpolation coefficients.

use k256::{elliptic_curve::Field, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};

use crate::types::Participant;

/// Generate a random degree `threshold - 1` polynomial, optionally with a
/// fixed constant term, together with Feldman commitments to every
/// coefficient.
pub(crate) fn generate_polynomial<R: RngCore + CryptoRng>(
    rng: &mut R,
    threshold: u16,
    constant: Option<Scalar>,
) -> (Vec<Scalar>, Vec<ProjectivePoint>) {
    let mut coefficients = Vec::with_capacity(usize::from(threshold));
    let mut commitments = Vec::with_capacity(usize::from(threshold));

    for i in 0..threshold {
        let coefficient = match (i, constant) {
            (0, Some(constant)) => constant,
            _ => Scalar::random(&mut *rng),
        };
        commitments.push(ProjectivePoint::GENERATOR * coefficient);
        coefficients.push(coefficient);
    }

    (coefficients, commitments)
}

/// Evaluate a polynomial at a participant's index
pub(crate) fn evaluate(coefficients: &[Scalar], at: Participant) -> Scalar {
    let x = at.scalar();
    let mut result = Scalar::ZERO;
    let mut x_power = Scalar::ONE;
    for coefficient in coefficients {
        result += *coefficient * x_power;
        x_power *= x;
    }
    result
}

/// Evaluate a Feldman commitment vector at a participant's index, yielding
/// the public point the participant's share must match
pub(crate) fn evaluate_commitments(commitments: &[ProjectivePoint], at: Participant) -> ProjectivePoint {
    let x = at.scalar();
    let mut result = ProjectivePoint::IDENTITY;
    let mut x_power = Scalar::ONE;
    for commitment in commitments {
        result += *commitment * x_power;
        x_power *= x;
    }
    result
}

/// Verify a share against its sender's Feldman commitments
pub(crate) fn verify_share(share: &Scalar, commitments: &[ProjectivePoint], at: Participant) -> bool {
    ProjectivePoint::GENERATOR * share == evaluate_commitments(commitments, at)
}

/// Lagrange interpolation coefficient at zero for `i` over `set`.
///
/// `set` must contain `i` and hold distinct indices; both are validated by
/// every caller before reaching this point.
pub(crate) fn lagrange(i: Participant, set: &[Participant]) -> Scalar {
    let x_i = i.scalar();
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;
    for &j in set {
        if j == i {
            continue;
        }
        let x_j = j.scalar();
        numerator *= x_j;
        denominator *= x_j - x_i;
    }
    numerator * Option::<Scalar>::from(denominator.invert()).unwrap_or(Scalar::ONE)
}

/// Sum per-sender commitment vectors into per-degree "stripes". Evaluating
/// the stripes at a participant's index yields that participant's
/// verification share; stripe zero is the group public key.
pub(crate) fn sum_commitments(all: &[Vec<ProjectivePoint>]) -> Vec<ProjectivePoint> {
    let degree = all.first().map(Vec::len).unwrap_or(0);
    let mut stripes = vec![ProjectivePoint::IDENTITY; degree];
    for commitments in all {
        for (stripe, commitment) in stripes.iter_mut().zip(commitments) {
            *stripe += commitment;
        }
    }
    stripes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn p(i: u16) -> Participant {
        Participant::new(i).unwrap()
    }

    #[test]
    fn shares_match_commitments() {
        let (coefficients, commitments) = generate_polynomial(&mut OsRng, 3, None);
        for i in 1..=5u16 {
            let share = evaluate(&coefficients, p(i));
            assert!(verify_share(&share, &commitments, p(i)));
        }
        let share = evaluate(&coefficients, p(1));
        assert!(!verify_share(&(share + Scalar::ONE), &commitments, p(1)));
    }

    #[test]
    fn lagrange_reconstructs_the_constant_term() {
        let secret = Scalar::random(&mut OsRng);
        let (coefficients, _) = generate_polynomial(&mut OsRng, 3, Some(secret));

        // Any 3 of 5 shares reconstruct
        for set in [[p(1), p(2), p(3)], [p(2), p(4), p(5)], [p(1), p(3), p(5)]] {
            let mut reconstructed = Scalar::ZERO;
            for &i in &set {
                reconstructed += lagrange(i, &set) * evaluate(&coefficients, i);
            }
            assert_eq!(reconstructed, secret);
        }
    }

    #[test]
    fn fixed_constant_term_is_committed() {
        let secret = Scalar::from(99u64);
        let (coefficients, commitments) = generate_polynomial(&mut OsRng, 2, Some(secret));
        assert_eq!(coefficients[0], secret);
        assert_eq!(commitments[0], ProjectivePoint::GENERATOR * secret);
    }
}
