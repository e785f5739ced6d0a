//! Accelerator device enumeration and MMA capabilities
//!
//! Devices are identified by a plain index into the enumerated list; anything
//! richer (PCI topology, driver versions) is out of scope. Each device
//! advertises the hardware family of its matrix unit and the native tile
//! shape that family's fused multiply-accumulate instruction operates on.

use serde::{Deserialize, Serialize};

use crate::kernels::tile::{TK, TM, TN};

/// Hardware family of a device's matrix-multiply-accumulate unit.
///
/// The generic tiling loop is written once against
/// [`crate::kernels::tile::TileMatmulUnit`]; each family provides one
/// implementation of that trait. Adding support for a native accelerator
/// means adding a variant here plus its unit, without touching the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MmaFamily {
    /// Host-side emulation of the fixed-function tile unit.
    ///
    /// Reproduces the native numeric semantics: f16 operands, widened f32
    /// accumulation with no intermediate rounding between K-steps.
    Emulated,
}

/// Native operand shape of one tile-multiply instruction: an accumulator of
/// `tm x tn` fed by `tm x tk` and `tk x tn` operand tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileShape {
    /// Output tile rows
    pub tm: usize,
    /// Output tile columns
    pub tn: usize,
    /// Reduction sub-tile depth
    pub tk: usize,
}

impl TileShape {
    /// Reference f16 configuration: TM=8, TN=16, TK=16.
    pub const F16: TileShape = TileShape {
        tm: TM,
        tn: TN,
        tk: TK,
    };

    /// Whether an `M x N x K` problem decomposes into whole tiles.
    #[must_use]
    pub fn divides(&self, m: usize, n: usize, k: usize) -> bool {
        m % self.tm == 0 && n % self.tn == 0 && k % self.tk == 0
    }
}

/// Description of one enumerated accelerator device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Position in the enumerated device list
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Hardware family of the device's MMA unit
    pub family: MmaFamily,
    /// Native tile shape of the MMA instruction
    pub tile_shape: TileShape,
}

/// Enumerate the available accelerator devices.
///
/// The emulated MMA device is always present, so the list is never empty and
/// index 0 is always a valid fallback target.
#[must_use]
pub fn enumerate() -> Vec<DeviceInfo> {
    vec![DeviceInfo {
        index: 0,
        name: "emulated-mma-0".to_string(),
        family: MmaFamily::Emulated,
        tile_shape: TileShape::F16,
    }]
}
