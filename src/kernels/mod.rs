//! Device kernels
//!
//! - [`tile`]: tile fragments, the [`tile::TileMatmulUnit`] capability trait,
//!   and the emulated MMA unit
//! - [`gemm`]: the generic tiled GEMM loop and the half-precision entry point

pub mod gemm;
pub mod tile;

pub use gemm::{gemm_f16, run_half_precision_matmul, GemmShape};
pub use tile::{AccTile, ATile, BTile, EmulatedMmaUnit, TileMatmulUnit, TK, TM, TN};
