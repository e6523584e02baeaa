//! Pipeline stages for one acquisition request.
//!
//! Each submodule is one component with one seam trait, so the orchestrator
//! in [`crate::acquire`] can be exercised with fakes and each real
//! implementation can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! render ──▶ fetch ──▶ worker
//! (Chrome)   (HTTP GET)  (POST input/output paths)
//! ```
//!
//! 1. [`render`] — navigate, list `<img>` elements, keep the tall absolute
//!    ones, or fall back to a viewport screenshot
//! 2. [`chrome`] — the chromiumoxide-backed browser behind [`render`]
//! 3. [`fetch`]  — stream each discovered image into the session directory
//! 4. [`worker`] — hand each local image to the translation worker

pub mod chrome;
pub mod fetch;
pub mod render;
pub mod worker;
