//! Interrupt-shared state
//!
//! An alarm handler is an `extern "C" fn()` with no arguments, so whatever
//! it drives has to live in a `static`. [`Exclusive`] is that static: a
//! slot filled once by the main thread and then borrowed inside a critical
//! section by whoever needs it, handler included.

use core::cell::RefCell;

use critical_section::Mutex;

/// A `static`-friendly slot holding a value shared between the main thread
/// and interrupt handlers.
///
/// ```
/// use rp235x_softpwm::Exclusive;
///
/// static COUNT: Exclusive<u32> = Exclusive::new();
///
/// assert_eq!(COUNT.with(|c| *c += 1), None);
/// COUNT.install(41);
/// COUNT.with(|c| *c += 1);
/// assert_eq!(COUNT.take(), Some(42));
/// ```
pub struct Exclusive<S> {
    slot: Mutex<RefCell<Option<S>>>,
}

impl<S> Default for Exclusive<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Exclusive<S> {
    /// An empty slot.
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(RefCell::new(None)),
        }
    }

    /// Put `value` in the slot, returning what was there before.
    pub fn install(&self, value: S) -> Option<S> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).replace(value))
    }

    /// Run `f` on the value with interrupts masked. `None` if the slot is
    /// empty.
    ///
    /// Calling `with` on the same slot from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Empty the slot.
    pub fn take(&self) -> Option<S> {
        critical_section::with(|cs| self.slot.borrow_ref_mut(cs).take())
    }

    /// Whether the slot holds a value.
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.slot.borrow_ref(cs).is_some())
    }
}
