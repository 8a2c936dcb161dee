//! Global memory allocator configuration.
//!
//! `mimalloc` replaces the system allocator for the same reason the original
//! tool picked it: many short-lived buffer allocations (file bodies, frame
//! reads) under concurrent load benefit from its lower lock contention.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
