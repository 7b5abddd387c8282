//! Pipeline stages for scene-document mesh conversion.
//!
//! Each submodule implements exactly one step and is tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! document ──▶ extract ──▶ resolve ──▶ cache ──▶ rewrite
//!   (XML)      (<mesh>)    (scheme)   (transcode  (new
//!                                      once)       <uri>s)
//! ```
//!
//! 1. [`extract`]: stream the XML and collect every `<mesh>` URI, scale and
//!    URI text span
//! 2. [`resolve`]: map `file://`, `model://`, `package://` and plain URIs to
//!    an existing file through an ordered strategy chain
//! 3. [`cache`]: transcode each canonical source at most once per run; the
//!    transcoder runs in `spawn_blocking`
//! 4. [`rewrite`]: substitute converted paths, relative to the output
//!    document, textually or by recorded span

pub mod cache;
pub mod extract;
pub mod resolve;
pub mod rewrite;
