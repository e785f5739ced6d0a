//! Property-based tests for the tiled GEMM
//!
//! Invariants checked over randomized tile-aligned shapes and values:
//! - kernel output matches a scalar reference within f16 tolerance
//! - the alpha/beta epilogue blends correctly
//! - repeated launches into the same output leave only the last result

use half::f16;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tesela::kernels::tile::EmulatedMmaUnit;
use tesela::{create_context, gemm_f16, run_half_precision_matmul, DeviceBuffer, GemmShape};

fn random_f16(rng: &mut StdRng, len: usize) -> Vec<f16> {
    (0..len)
        .map(|_| f16::from_f32(rng.gen_range(-1.0f32..1.0)))
        .collect()
}

fn reference_matmul(a: &[f16], b: &[f16], m: usize, n: usize, k: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for l in 0..k {
                sum += a[i * k + l].to_f32() * b[l * n + j].to_f32();
            }
            c[i * n + j] = sum;
        }
    }
    c
}

proptest! {
    /// Kernel output equals the scalar reference within half-precision
    /// rounding tolerance, for any tile-aligned shape.
    #[test]
    fn prop_gemm_matches_reference(
        m_tiles in 1usize..=4,
        n_tiles in 1usize..=3,
        k_tiles in 1usize..=4,
        seed in any::<u64>(),
    ) {
        let (m, n, k) = (m_tiles * 8, n_tiles * 16, k_tiles * 16);
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_f16(&mut rng, m * k);
        let b = random_f16(&mut rng, k * n);

        let ctx = create_context(0).expect("context");
        let a_buf = DeviceBuffer::from_slice(&a);
        let b_buf = DeviceBuffer::from_slice(&b);
        let c_buf = DeviceBuffer::zeros(m * n);
        run_half_precision_matmul(&ctx, &a_buf, &b_buf, &c_buf, m, n, k)
            .expect("launch")
            .wait()
            .expect("completion");

        let want = reference_matmul(&a, &b, m, n, k);
        for (got, want) in c_buf.to_f32_vec().iter().zip(want.iter()) {
            // One f16 rounding on top of f32 accumulation.
            let tol = 1e-2f32.max(want.abs() * 1e-2);
            prop_assert!(
                (got - want).abs() <= tol,
                "got {got}, want {want} (tol {tol})"
            );
        }
    }

    /// The generic kernel honors the alpha/beta epilogue:
    /// C = alpha * A*B + beta * C0.
    #[test]
    fn prop_gemm_alpha_beta_epilogue(
        seed in any::<u64>(),
        alpha in -2.0f32..2.0,
        beta in -2.0f32..2.0,
    ) {
        let (m, n, k) = (8, 16, 32);
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_f16(&mut rng, m * k);
        let b = random_f16(&mut rng, k * n);
        let c0 = random_f16(&mut rng, m * n);

        let mut c = c0.clone();
        let shape = GemmShape::new(m, n, k);
        gemm_f16(&EmulatedMmaUnit, &a, &b, &mut c, shape, alpha, beta).expect("gemm");

        let product = reference_matmul(&a, &b, m, n, k);
        for ((got, prod), prior) in c.iter().zip(product.iter()).zip(c0.iter()) {
            let want = alpha * prod + beta * prior.to_f32();
            let tol = 2e-2f32.max(want.abs() * 2e-2);
            prop_assert!(
                (got.to_f32() - want).abs() <= tol,
                "got {got}, want {want} (alpha {alpha}, beta {beta})"
            );
        }
    }

    /// beta = 0 at the entry point: a second launch fully overwrites the
    /// first, regardless of what was computed before.
    #[test]
    fn prop_second_launch_overwrites_first(seed in any::<u64>()) {
        let (m, n, k) = (16, 16, 16);
        let mut rng = StdRng::seed_from_u64(seed);
        let a1 = random_f16(&mut rng, m * k);
        let b1 = random_f16(&mut rng, k * n);
        let a2 = random_f16(&mut rng, m * k);
        let b2 = random_f16(&mut rng, k * n);

        let ctx = create_context(0).expect("context");
        let c_buf = DeviceBuffer::zeros(m * n);
        for (a, b) in [(&a1, &b1), (&a2, &b2)] {
            let a_buf = DeviceBuffer::from_slice(a);
            let b_buf = DeviceBuffer::from_slice(b);
            run_half_precision_matmul(&ctx, &a_buf, &b_buf, &c_buf, m, n, k)
                .expect("launch")
                .wait()
                .expect("completion");
        }

        let want = reference_matmul(&a2, &b2, m, n, k);
        for (got, want) in c_buf.to_f32_vec().iter().zip(want.iter()) {
            let tol = 1e-2f32.max(want.abs() * 1e-2);
            prop_assert!((got - want).abs() <= tol, "got {got}, want {want}");
        }
    }
}
