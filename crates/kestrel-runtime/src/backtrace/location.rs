//! Packed frame locations and the version guard
//!
//! A stored location is `(bci << 16) | version`. The version is the declaring
//! class's generation at capture time; comparing it against the method that
//! resolves later tells a live frame from one whose code has been replaced.

use crate::code::SYNCHRONIZATION_ENTRY_BCI;
use crate::oops::Method;

/// Saturated version, assigned once a class outgrows the 16-bit field
///
/// Never matches any method, so such frames always materialize as redefined.
pub const MAX_VERSION: u16 = u16::MAX;

/// Largest bytecode index a location can hold
pub const MAX_BCI: i32 = u16::MAX as i32;

/// True when `bci` can be stored; the sync-entry sentinel stores as 0
pub fn bci_fits(bci: i32) -> bool {
    bci == SYNCHRONIZATION_ENTRY_BCI || (0..=MAX_BCI).contains(&bci)
}

/// Pack a bytecode index and class generation
///
/// Callers check [`bci_fits`] first.
pub fn encode(bci: i32, generation: u32) -> u32 {
    assert!(bci_fits(bci), "bci {bci} does not fit a location");
    let bci = if bci == SYNCHRONIZATION_ENTRY_BCI { 0 } else { bci as u32 };
    (bci << 16) | u32::from(version_of(generation))
}

/// Bytecode index of a packed location
pub fn bci_at(location: u32) -> i32 {
    (location >> 16) as i32
}

/// Class version of a packed location
pub fn version_at(location: u32) -> u16 {
    (location & 0xFFFF) as u16
}

/// Class version stored for a generation
pub fn version_of(generation: u32) -> u16 {
    if generation >= u32::from(MAX_VERSION) {
        MAX_VERSION
    } else {
        generation as u16
    }
}

/// True when `method` exists and still belongs to the stored class version
pub fn version_matches(method: Option<&Method>, version: u16) -> bool {
    match method {
        Some(method) => version != MAX_VERSION && method.generation() == u32::from(version),
        None => false,
    }
}
