//! Tiled half-precision GEMM over the MMA capability trait
//!
//! The output matrix is partitioned into a `(M/TM) x (N/TN)` grid and one
//! cooperative group computes each output tile: zero an accumulator, stream
//! the K dimension through the unit's fused multiply-accumulate in `TK`
//! steps, then store with the `alpha`/`beta` epilogue. Groups own disjoint
//! slices of C and never synchronize with each other, so the device is free
//! to run them in any order.
//!
//! The public entry point [`run_half_precision_matmul`] pins `alpha = 1`,
//! `beta = 0`: C is unconditionally overwritten with `A * B`.

use half::f16;
use rayon::prelude::*;

use crate::buffer::DeviceBuffer;
use crate::error::{Result, TeselaError};
use crate::kernels::tile::{AccTile, EmulatedMmaUnit, TileMatmulUnit, TK, TM, TN};
use crate::queue::{CompletionHandle, Context};

/// Logical GEMM problem shape: A is `m x k`, B is `k x n`, C is `m x n`,
/// all row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GemmShape {
    /// Rows of A and C
    pub m: usize,
    /// Columns of B and C
    pub n: usize,
    /// Columns of A / rows of B (reduction dimension)
    pub k: usize,
}

impl GemmShape {
    /// Construct a shape descriptor.
    #[must_use]
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }

    /// Check the tile-divisibility precondition.
    ///
    /// M, N, K must each be positive exact multiples of TM, TN, TK. The
    /// reference design left this unchecked (out-of-bounds access on
    /// violation); here it is a fail-fast, recoverable error.
    ///
    /// # Errors
    ///
    /// Returns [`TeselaError::InvalidShape`] naming the violated dimension.
    pub fn validate(&self) -> Result<()> {
        for (dim, value, tile) in [
            ("M", self.m, TM),
            ("N", self.n, TN),
            ("K", self.k, TK),
        ] {
            if value == 0 || value % tile != 0 {
                return Err(TeselaError::InvalidShape {
                    reason: format!(
                        "{dim}={value} is not a positive multiple of the tile dimension {tile}"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Tile grid generated by this shape: `(M/TM, N/TN)`.
    #[must_use]
    pub fn grid(&self) -> (usize, usize) {
        (self.m / TM, self.n / TN)
    }

    /// Total number of output tiles (cooperative groups) per launch.
    #[must_use]
    pub fn tiles(&self) -> usize {
        let (rows, cols) = self.grid();
        rows * cols
    }
}

/// Check that buffer lengths match the row-major layouts of `shape`.
fn validate_lengths(shape: GemmShape, a_len: usize, b_len: usize, c_len: usize) -> Result<()> {
    let expected = [
        ("A", a_len, shape.m * shape.k),
        ("B", b_len, shape.k * shape.n),
        ("C", c_len, shape.m * shape.n),
    ];
    for (name, actual, wanted) in expected {
        if actual != wanted {
            return Err(TeselaError::InvalidShape {
                reason: format!("{name} has {actual} elements, layout requires {wanted}"),
            });
        }
    }
    Ok(())
}

/// Compute one output tile: fresh accumulator, K-loop through the MMA unit,
/// epilogue store into the group's disjoint slice of C.
fn compute_tile<U: TileMatmulUnit>(
    unit: &U,
    a: &[f16],
    b: &[f16],
    band: &mut [f16],
    row_tile: usize,
    col_tile: usize,
    shape: GemmShape,
    alpha: f32,
    beta: f32,
) {
    let row0 = row_tile * TM;
    let col0 = col_tile * TN;
    let mut acc = AccTile::zeroed();
    let mut kk = 0;
    while kk < shape.k {
        let a_tile = unit.load_a_tile(&a[row0 * shape.k + kk..], shape.k);
        let b_tile = unit.load_b_tile(&b[kk * shape.n + col0..], shape.n);
        unit.multiply_accumulate(&mut acc, &a_tile, &b_tile);
        kk += TK;
    }
    unit.store_tile(&acc, &mut band[col0..], shape.n, alpha, beta);
}

/// Generic tiled GEMM: `C = alpha * (A * B) + beta * C`.
///
/// Cooperative groups fan out over row bands of C (each band is `TM` whole
/// rows, a disjoint `&mut` slice), with the column tiles of a band walked
/// sequentially inside its group. Accumulation is carried in f32 across
/// K-steps and rounded to f16 once, at store time.
///
/// # Errors
///
/// Returns [`TeselaError::InvalidShape`] if the shape violates the tile
/// divisibility precondition or any buffer length mismatches its layout.
/// The output is untouched on error.
pub fn gemm_f16<U: TileMatmulUnit>(
    unit: &U,
    a: &[f16],
    b: &[f16],
    c: &mut [f16],
    shape: GemmShape,
    alpha: f32,
    beta: f32,
) -> Result<()> {
    shape.validate()?;
    validate_lengths(shape, a.len(), b.len(), c.len())?;

    let (_, grid_cols) = shape.grid();
    c.par_chunks_mut(TM * shape.n)
        .enumerate()
        .for_each(|(row_tile, band)| {
            for col_tile in 0..grid_cols {
                compute_tile(unit, a, b, band, row_tile, col_tile, shape, alpha, beta);
            }
        });
    Ok(())
}

/// Launch a half-precision matmul on `context`: `C = A * B` with `alpha = 1`,
/// `beta = 0` (C is fully overwritten).
///
/// Shape and buffer-length preconditions are checked synchronously before
/// submission; execution faults surface through the returned handle's
/// [`CompletionHandle::wait`]. On an in-order context a subsequent launch
/// automatically observes this launch's effects.
///
/// # Errors
///
/// Returns [`TeselaError::InvalidShape`] for precondition violations
/// (including an output buffer that aliases an input, which the submission
/// model forbids within one launch) and [`TeselaError::QueueClosed`] if the
/// context has shut down.
pub fn run_half_precision_matmul(
    context: &Context,
    a: &DeviceBuffer,
    b: &DeviceBuffer,
    c: &DeviceBuffer,
    m: usize,
    n: usize,
    k: usize,
) -> Result<CompletionHandle> {
    let shape = GemmShape::new(m, n, k);
    shape.validate()?;
    validate_lengths(shape, a.len(), b.len(), c.len())?;
    if c.same_storage(a) || c.same_storage(b) {
        return Err(TeselaError::InvalidShape {
            reason: "output buffer aliases an input buffer within one launch".to_string(),
        });
    }

    let (a, b, c) = (a.clone(), b.clone(), c.clone());
    context.submit_launch("gemm_f16", shape.tiles() as u64, move || {
        let a_guard = a.read();
        let b_guard = b.read();
        let mut c_guard = c.write();
        gemm_f16(
            &EmulatedMmaUnit,
            &a_guard,
            &b_guard,
            &mut c_guard,
            shape,
            1.0,
            0.0,
        )
    })
}
