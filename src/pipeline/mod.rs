//! Pipeline stages for STEP-to-mesh conversion.
//!
//! Each submodule implements one step of [`crate::convert::convert`]. The
//! B-rep kernel only appears in [`tessellate`]; everything after it works on
//! the reloaded [`crate::mesh::Mesh`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ tessellate ──▶ encode ──▶ measure
//! (scratch)  (STEP→STL)     (format)   (metrics)
//!    │
//!    └──▶ header   (inspect only, no tessellation)
//! ```
//!
//! 1. [`input`]: source document, STEP signature check, per-call
//!    scratch directory released on drop
//! 2. [`tessellate`]: [`tessellate::Tessellator`] seam and the truck-backed
//!    default; emits STL into scratch
//! 3. [`encode`]: transcode the canonical mesh into non-native formats
//! 4. [`measure`]: counts, volume, bounds, watertightness, DFM advisories
//! 5. [`header`]: STEP header summary for [`crate::convert::inspect`]

pub mod encode;
pub mod header;
pub mod input;
pub mod measure;
pub mod tessellate;
