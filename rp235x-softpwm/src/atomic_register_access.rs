//! Atomic set/clear aliases of peripheral registers
//!
//! Every APB/AHB peripheral register on the RP2350 is mirrored at
//! `+0x2000` (bitmask set) and `+0x3000` (bitmask clear). Writing through
//! an alias touches only the bits that are `1` in the written value, so
//! the pad and interrupt-enable updates done here need no read-modify-write.
//!
//! See [Section 2.1.3][section_2_1_3] of the RP2350 datasheet for details.
//!
//! [section_2_1_3]: https://rptl.io/rp2350-datasheet#atomic-rwtype

use core::ptr::write_volatile;

const SET_ALIAS_OFFSET: usize = 0x2000;
const CLEAR_ALIAS_OFFSET: usize = 0x3000;

/// Address of the bitmask-set alias of `register`.
#[inline]
pub(crate) const fn set_alias(register: usize) -> usize {
    register + SET_ALIAS_OFFSET
}

/// Address of the bitmask-clear alias of `register`.
#[inline]
pub(crate) const fn clear_alias(register: usize) -> usize {
    register + CLEAR_ALIAS_OFFSET
}

/// Set `bits` in `register` through its set alias.
///
/// # Safety
///
/// In addition to the requirements of [core::ptr::write_volatile],
/// `register` must point to a register providing atomic aliases.
#[inline]
pub(crate) unsafe fn write_bitmask_set(register: *mut u32, bits: u32) {
    write_volatile(set_alias(register as usize) as *mut u32, bits);
}

/// Clear `bits` in `register` through its clear alias.
///
/// # Safety
///
/// In addition to the requirements of [core::ptr::write_volatile],
/// `register` must point to a register providing atomic aliases.
#[inline]
pub(crate) unsafe fn write_bitmask_clear(register: *mut u32, bits: u32) {
    write_volatile(clear_alias(register as usize) as *mut u32, bits);
}
