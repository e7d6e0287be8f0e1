//! RAM interrupt vector table
//!
//! Binding a handler to a vector at run time needs the vector table in RAM:
//! the table `cortex-m-rt` links into flash is copied here, entries are
//! replaced, and the Vector Table Offset Register (VTOR) of the Cortex-M33
//! is pointed at the copy.

/// One word of the vector table. Zero-initialisable in a `const` context.
#[derive(Clone, Copy)]
union Vector {
    handler: extern "C" fn(),
    reserved: usize,
}

/// Index of the first external interrupt in the table (SP, reset and 14
/// system exceptions come first).
const EXTERNAL_BASE: usize = 16;

/// The Cortex-M33 cores on RP235x have 52 interrupt inputs; the last few
/// are software-only but still get an entry.
const EXTERNAL_COUNT: usize = 52;

/// An interrupt vector table aligned for VTOR (128-byte granularity).
#[repr(C, align(128))]
pub struct VectorTable {
    table: [Vector; EXTERNAL_BASE + EXTERNAL_COUNT],
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorTable {
    /// Create an all-zero table. Call [`init`](Self::init) before
    /// activating it.
    pub const fn new() -> VectorTable {
        VectorTable {
            table: [Vector { reserved: 0 }; EXTERNAL_BASE + EXTERNAL_COUNT],
        }
    }

    /// Copy the currently active vector table into this one.
    #[allow(clippy::needless_pass_by_ref_mut)]
    pub fn init(&mut self, ppb: &mut crate::pac::PPB) {
        let mut active = ppb.vtor().read().bits() as *const usize;
        for entry in self.table.iter_mut() {
            // Safety: VTOR points at a table of at least this many words.
            unsafe {
                *entry = Vector {
                    reserved: active.read(),
                };
                active = active.add(1);
            }
        }
    }

    /// Make `handler` the handler of external interrupt `irq`, replacing
    /// whatever was there.
    pub fn register_handler(&mut self, irq: usize, handler: extern "C" fn()) {
        self.table[EXTERNAL_BASE + irq].handler = handler;
    }

    /// Whether external interrupt `irq` currently points at `handler`.
    pub fn is_registered(&self, irq: usize, handler: extern "C" fn()) -> bool {
        // Safety: both variants are one machine word
        unsafe { self.table[EXTERNAL_BASE + irq].reserved == handler as usize }
    }

    /// Switch the current core to this table.
    ///
    /// # Safety
    /// Every entry must be valid: call [`init`](Self::init) first.
    #[allow(clippy::needless_pass_by_ref_mut)]
    pub unsafe fn activate(&mut self, ppb: &mut crate::pac::PPB) {
        ppb.vtor()
            .write(|w| w.bits(&mut self.table as *mut _ as *mut u32 as u32));
    }
}
