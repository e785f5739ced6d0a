//! # Tesela
//!
//! Tesela (Spanish: "tessera", a mosaic tile) is a half-precision tiled
//! matrix-multiplication kernel built around a fixed-function matrix
//! multiply-accumulate (MMA) tile unit, together with the low-latency,
//! strictly in-order command-submission context needed to dispatch it with
//! minimal overhead.
//!
//! The output matrix is partitioned into `8 x 16` tiles; one cooperative
//! group per tile streams the reduction dimension through the MMA unit in
//! 16-wide steps, accumulating in f32 and rounding to f16 once at store
//! time. The unit itself sits behind the
//! [`kernels::tile::TileMatmulUnit`] capability trait, with one
//! implementation per supported hardware family.
//!
//! ## Example
//!
//! ```rust
//! use tesela::{create_context, run_half_precision_matmul, DeviceBuffer};
//!
//! // One output tile: M=8, N=16, K=16.
//! let (m, n, k) = (8, 16, 16);
//! let mut a = vec![0.0f32; m * k];
//! for i in 0..m {
//!     a[i * k + i] = 1.0; // identity pattern
//! }
//! let b: Vec<f32> = (0..k * n).map(|v| (v % 7) as f32 * 0.5).collect();
//!
//! let ctx = create_context(0).expect("context");
//! let a = DeviceBuffer::from_f32(&a);
//! let b_buf = DeviceBuffer::from_f32(&b);
//! let c = DeviceBuffer::zeros(m * n);
//!
//! run_half_precision_matmul(&ctx, &a, &b_buf, &c, m, n, k)
//!     .expect("launch")
//!     .wait()
//!     .expect("completion");
//!
//! // A is an identity pattern, so C equals the first 8 rows of B.
//! assert_eq!(&c.to_f32_vec()[..], &b[..m * n]);
//! ```
//!
//! ## Preconditions
//!
//! M, N, K must be positive exact multiples of the tile dimensions (8, 16,
//! 16); violations are rejected with [`TeselaError::InvalidShape`] before
//! anything is launched. The public entry point always computes `C = A * B`
//! with `alpha = 1`, `beta = 0` — prior contents of C are never read.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::float_cmp)]

pub mod buffer;
pub mod device;
pub mod error;
pub mod kernels;
pub mod metrics;
pub mod queue;

pub use buffer::DeviceBuffer;
pub use device::{enumerate, DeviceInfo, MmaFamily, TileShape};
pub use error::{Result, TeselaError};
pub use kernels::{gemm_f16, run_half_precision_matmul, GemmShape};
pub use metrics::{LaunchMetrics, MetricsSnapshot};
pub use queue::{
    create_context, CompletionHandle, Context, DispatchMode, OrderingMode, QueueConfig,
    QueuePriority,
};
