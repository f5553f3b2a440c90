//! # Kernel Memory Initialization and Allocation
//!
//! This crate takes kernel memory from the state the bring-up stage leaves
//! behind (a small identity map and a list of RAM regions) to its steady
//! state: every available frame linearly mapped, and free pages managed by a
//! section allocator that any core can use.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  MemoryManager                      │
//! │    • map / translate / lookup_virtual               │
//! │    • alloc_page / alloc_dma / used_pages            │
//! │    • copy_physical                                  │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Frame Allocator Bridge                 │
//! │    • BitmapSectionAllocator behind a SpinLock       │
//! │    • atomic used-page counter                       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │        Bootstrap Allocator + Linear Pass            │
//! │    • bump allocation after the bring-up watermark   │
//! │    • one linear alias per region frame              │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Manager ([`manager`])
//!
//! [`MemoryManager::initialize`] runs the whole bring-up sequence once; any
//! failure halts the core through [`fatal`]. Afterwards the manager is the
//! only way the kernel touches page tables.
//!
//! ### Physical Mapper ([`phys_mapper`])
//!
//! Page tables are reached through the linear alias of their frame. A
//! [`VirtualWindow`] turns that alias into a pointer, which lets the same
//! code run in the kernel ([`DirectWindow`]) and against simulated memory.
//!
//! ### Bootstrap ([`bootstrap`], [`linear_map`])
//!
//! A forward-only bump allocator feeds page-table frames to the linear pass.
//! It is dropped as soon as the section allocator is configured.
//!
//! ### Bridge ([`bridge`], [`sections`])
//!
//! The [`SectionAllocator`] trait is the whole surface the core needs from a
//! steady-state allocator; [`BitmapSectionAllocator`] implements it.
//!
//! ### Physical Copy ([`phys_copy`])
//!
//! Copies from arbitrary physical addresses, mapping frames on demand.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kernel_alloc::{BitmapSectionAllocator, DirectWindow, MemoryManager};
//!
//! let mm = unsafe {
//!     MemoryManager::initialize(
//!         &handoff,
//!         &boot_map,
//!         MemoryConfig::default(),
//!         BitmapSectionAllocator::new(),
//!         DirectWindow,
//!         platform,
//!     )
//! };
//! let page = mm.alloc_page();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod bootstrap;
pub mod bridge;
mod fatal;
pub mod linear_map;
pub mod manager;
pub mod phys_copy;
pub mod phys_mapper;
pub mod sections;

#[cfg(test)]
mod testing;

pub use bridge::{FrameBridge, SectionAllocator, SectionError};
pub use fatal::fatal;
pub use manager::MemoryManager;
pub use phys_mapper::{DirectWindow, LinearMapper, VirtualWindow};
pub use sections::BitmapSectionAllocator;
