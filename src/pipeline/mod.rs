//! Pipeline stages for PDF-to-PNG conversion.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ archive ──▶ download
//! (bytes)   (pdfium)   (PNG)      (zip)       (save)
//! ```
//!
//! 1. [`input`]   : validate the selection and hold its bytes
//! 2. [`render`]  : rasterise one page at a time at a fixed zoom
//! 3. [`encode`]  : PNG-encode each bitmap, as a data URL or raw bytes
//! 4. [`archive`] : pack the PNGs into one in-memory zip (archive mode)
//! 5. [`download`]: save the finished artifact under its file name(s)

pub mod archive;
pub mod download;
pub mod encode;
pub mod input;
pub mod render;
