//! Tile fragments and the MMA capability trait
//!
//! The accelerator's fixed-function matrix unit multiplies a `TM x TK` f16
//! tile by a `TK x TN` f16 tile and accumulates into a `TM x TN` tile in one
//! instruction. Different hardware families expose different native shapes
//! and instructions, so the operation set is modeled as a trait
//! ([`TileMatmulUnit`]) and the generic tiling loop in
//! [`crate::kernels::gemm`] is written once against it.
//!
//! One family is currently implemented: [`EmulatedMmaUnit`], which reproduces
//! the unit's numeric contract on the host — f16 operands, f32 accumulation
//! with no intermediate rounding between K-steps, and a single rounding to
//! f16 at store time.

use half::f16;

/// Output tile rows per MMA instruction (reference f16 configuration).
pub const TM: usize = 8;
/// Output tile columns per MMA instruction.
pub const TN: usize = 16;
/// Reduction depth consumed per MMA instruction.
pub const TK: usize = 16;

/// A-operand fragment: `TM x TK` slice of the left matrix.
#[derive(Debug, Clone)]
pub struct ATile(pub(crate) [[f16; TK]; TM]);

/// B-operand fragment: `TK x TN` slice of the right matrix.
#[derive(Debug, Clone)]
pub struct BTile(pub(crate) [[f16; TN]; TK]);

/// Accumulator fragment: `TM x TN`, carried in f32 across K-steps.
///
/// Ephemeral and owned by exactly one cooperative group; it exists only
/// between [`AccTile::zeroed`] and the group's final
/// [`TileMatmulUnit::store_tile`].
#[derive(Debug, Clone)]
pub struct AccTile(pub(crate) [[f32; TN]; TM]);

impl AccTile {
    /// Fresh zero-initialized accumulator for one output tile.
    #[must_use]
    pub fn zeroed() -> Self {
        AccTile([[0.0f32; TN]; TM])
    }

    /// Accumulator element at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.0[row][col]
    }
}

/// Capability set of one hardware family's matrix unit.
///
/// `src`/`dst` point at the first element of the tile inside a row-major
/// matrix with row stride `stride` (elements, not bytes). Callers guarantee
/// the slice covers the full tile: at least `(rows - 1) * stride + cols`
/// elements.
pub trait TileMatmulUnit: Send + Sync {
    /// Load a `TM x TK` fragment of the left matrix.
    fn load_a_tile(&self, src: &[f16], stride: usize) -> ATile;

    /// Load a `TK x TN` fragment of the right matrix.
    fn load_b_tile(&self, src: &[f16], stride: usize) -> BTile;

    /// Fused tile multiply-accumulate: `acc += a * b`.
    ///
    /// Accumulation happens in the unit's native precision with no rounding
    /// to f16 between successive K-steps.
    fn multiply_accumulate(&self, acc: &mut AccTile, a: &ATile, b: &BTile);

    /// Store the accumulator into the output matrix with the blend epilogue
    /// `dst = alpha * acc + beta * dst`.
    ///
    /// With `beta == 0.0` the prior contents of `dst` are never read, so an
    /// uninitialized (or NaN-filled) output buffer is fully overwritten.
    fn store_tile(&self, acc: &AccTile, dst: &mut [f16], stride: usize, alpha: f32, beta: f32);
}

/// Host-side emulation of the fixed-function tile unit
/// ([`crate::device::MmaFamily::Emulated`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmulatedMmaUnit;

impl TileMatmulUnit for EmulatedMmaUnit {
    fn load_a_tile(&self, src: &[f16], stride: usize) -> ATile {
        debug_assert!(src.len() >= (TM - 1) * stride + TK);
        let mut tile = [[f16::ZERO; TK]; TM];
        for (i, row) in tile.iter_mut().enumerate() {
            row.copy_from_slice(&src[i * stride..i * stride + TK]);
        }
        ATile(tile)
    }

    fn load_b_tile(&self, src: &[f16], stride: usize) -> BTile {
        debug_assert!(src.len() >= (TK - 1) * stride + TN);
        let mut tile = [[f16::ZERO; TN]; TK];
        for (i, row) in tile.iter_mut().enumerate() {
            row.copy_from_slice(&src[i * stride..i * stride + TN]);
        }
        BTile(tile)
    }

    fn multiply_accumulate(&self, acc: &mut AccTile, a: &ATile, b: &BTile) {
        for i in 0..TM {
            for (l, b_row) in b.0.iter().enumerate() {
                let a_val = a.0[i][l].to_f32();
                for j in 0..TN {
                    acc.0[i][j] += a_val * b_row[j].to_f32();
                }
            }
        }
    }

    fn store_tile(&self, acc: &AccTile, dst: &mut [f16], stride: usize, alpha: f32, beta: f32) {
        debug_assert!(dst.len() >= (TM - 1) * stride + TN);
        for (i, acc_row) in acc.0.iter().enumerate() {
            let out_row = &mut dst[i * stride..i * stride + TN];
            for (j, out) in out_row.iter_mut().enumerate() {
                // beta == 0 must not read prior contents (overwrite semantics,
                // and 0 * NaN would otherwise poison the result).
                let blended = if beta == 0.0 {
                    alpha * acc_row[j]
                } else {
                    alpha * acc_row[j] + beta * out.to_f32()
                };
                *out = f16::from_f32(blended);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f16_vec(values: &[f32]) -> Vec<f16> {
        values.iter().copied().map(f16::from_f32).collect()
    }

    #[test]
    fn test_acc_tile_zeroed() {
        let acc = AccTile::zeroed();
        for i in 0..TM {
            for j in 0..TN {
                assert_eq!(acc.get(i, j), 0.0);
            }
        }
    }

    #[test]
    fn test_load_a_tile_strided() {
        // Matrix with stride 2*TK; tile starts at column 0.
        let stride = 2 * TK;
        let src: Vec<f16> = (0..TM * stride).map(|v| f16::from_f32(v as f32)).collect();
        let unit = EmulatedMmaUnit;
        let tile = unit.load_a_tile(&src, stride);
        assert_eq!(tile.0[0][0].to_f32(), 0.0);
        assert_eq!(tile.0[1][0].to_f32(), stride as f32);
        assert_eq!(tile.0[2][3].to_f32(), (2 * stride + 3) as f32);
    }

    #[test]
    fn test_mma_identity_passthrough() {
        // A = I (TM x TK), B arbitrary: acc picks up the first TM rows of B.
        let unit = EmulatedMmaUnit;
        let mut a = vec![f16::ZERO; TM * TK];
        for i in 0..TM {
            a[i * TK + i] = f16::ONE;
        }
        let b: Vec<f16> = (0..TK * TN)
            .map(|v| f16::from_f32((v % 13) as f32 * 0.25))
            .collect();

        let a_tile = unit.load_a_tile(&a, TK);
        let b_tile = unit.load_b_tile(&b, TN);
        let mut acc = AccTile::zeroed();
        unit.multiply_accumulate(&mut acc, &a_tile, &b_tile);

        for i in 0..TM {
            for j in 0..TN {
                assert_eq!(acc.get(i, j), b[i * TN + j].to_f32());
            }
        }
    }

    #[test]
    fn test_mma_accumulates_across_calls() {
        let unit = EmulatedMmaUnit;
        let a = f16_vec(&vec![1.0; TM * TK]);
        let b = f16_vec(&vec![0.5; TK * TN]);
        let a_tile = unit.load_a_tile(&a, TK);
        let b_tile = unit.load_b_tile(&b, TN);

        let mut acc = AccTile::zeroed();
        unit.multiply_accumulate(&mut acc, &a_tile, &b_tile);
        unit.multiply_accumulate(&mut acc, &a_tile, &b_tile);

        // Each call adds TK * 1.0 * 0.5 = 8.0.
        assert_eq!(acc.get(0, 0), 16.0);
        assert_eq!(acc.get(TM - 1, TN - 1), 16.0);
    }

    #[test]
    fn test_store_tile_beta_zero_ignores_prior_nan() {
        let unit = EmulatedMmaUnit;
        let acc = AccTile::zeroed();
        let mut dst = vec![f16::NAN; TM * TN];
        unit.store_tile(&acc, &mut dst, TN, 1.0, 0.0);
        assert!(dst.iter().all(|v| v.to_f32() == 0.0));
    }

    #[test]
    fn test_store_tile_alpha_beta_blend() {
        let unit = EmulatedMmaUnit;
        let mut acc = AccTile::zeroed();
        acc.0[0][0] = 3.0;
        let mut dst = vec![f16::from_f32(2.0); TM * TN];
        unit.store_tile(&acc, &mut dst, TN, 2.0, 0.5);
        // dst[0] = 2.0 * 3.0 + 0.5 * 2.0 = 7.0; elsewhere 0.5 * 2.0 = 1.0.
        assert_eq!(dst[0].to_f32(), 7.0);
        assert_eq!(dst[1].to_f32(), 1.0);
    }
}
