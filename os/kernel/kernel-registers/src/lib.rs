//! # Typed `X84_64` Registers and Instructions
//!
//! The few privileged operations the memory core needs: reading CR3,
//! invalidating a single TLB entry and stopping the processor. Everything
//! touching real hardware sits behind the `asm` feature and only exists on
//! `x86_64`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(feature = "cr3")]
pub mod cr3;

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
pub mod cpu;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}
