//! Pipeline stages for corpus similarity analysis.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//!                     ┌─▶ preprocess ─────────────┐
//! input ──▶ extract ──┤                           ├──▶ score
//! (folder)  (lopdf)   └─▶ canonical (per image) ──┘   (rayon)
//! ```
//!
//! 1. [`input`]      — list the folder's PDFs in stable order
//! 2. [`extract`]    — lowercased text and embedded images of one PDF; runs
//!    in `spawn_blocking` because PDF parsing is CPU-bound and synchronous
//! 3. [`preprocess`] — text normalisation (stop words, [`stem`]ming)
//! 4. [`canonical`]  — image normalisation to a fixed 100×100 matrix
//! 5. [`score`]      — every unordered pair under every configured metric

pub mod canonical;
pub mod extract;
pub mod input;
pub mod preprocess;
pub mod score;
pub mod stem;
