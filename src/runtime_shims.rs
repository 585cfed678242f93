//! ESP-IDF runtime symbol providers for third-party crates.
//!
//! `embassy-sync` needs a `critical-section` implementation and
//! `embassy-time` needs a time driver.  On the host these come from the
//! crates' `std` features; on ESP-IDF the firmware provides them here,
//! backed by a process mutex and `esp_timer`.

#[cfg(target_os = "espidf")]
use core::cell::{Cell, RefCell};
#[cfg(target_os = "espidf")]
use core::time::Duration;
#[cfg(target_os = "espidf")]
use std::sync::{Mutex, MutexGuard};

// ── critical-section 1.x ──────────────────────────────────────

#[cfg(target_os = "espidf")]
static CS_MUTEX: Mutex<()> = Mutex::new(());

#[cfg(target_os = "espidf")]
thread_local! {
    static CS_DEPTH: Cell<u8> = const { Cell::new(0) };
    static CS_GUARD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

/// Re-entrant acquire: only the outermost nesting level takes the mutex.
#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    CS_DEPTH.with(|depth| {
        CS_GUARD.with(|guard| {
            let d = depth.get();
            if d == 0 {
                let lock = CS_MUTEX.lock().expect("critical-section mutex poisoned");
                *guard.borrow_mut() = Some(lock);
            }
            let nested = d.saturating_add(1);
            depth.set(nested);
            nested
        })
    })
}

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    CS_DEPTH.with(|depth| {
        CS_GUARD.with(|guard| {
            let d = depth.get();
            if d == 0 {
                return;
            }
            let nested = d - 1;
            depth.set(nested);
            if nested == 0 {
                *guard.borrow_mut() = None;
            }
        })
    })
}

// ── embassy-time driver ───────────────────────────────────────

#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_now() -> u64 {
    // SAFETY: esp_timer_get_time has no preconditions after boot.
    unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
}

/// Wake scheduler for async timers: one short-lived thread per pending
/// deadline sleeps until it is due and fires the waker.
#[cfg(target_os = "espidf")]
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_schedule_wake(at: u64, waker: *mut core::ffi::c_void) {
    if waker.is_null() {
        return;
    }

    // SAFETY: embassy-time passes a valid `Waker` pointer for the duration
    // of schedule registration; it is cloned before this call returns.
    let waker = unsafe { (*(waker as *const core::task::Waker)).clone() };
    std::thread::spawn(move || {
        let now = _embassy_time_now();
        if at > now {
            std::thread::sleep(Duration::from_micros(at - now));
        }
        waker.wake();
    });
}
