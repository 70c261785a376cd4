//! `space_shared`
//!
//! Libraries shared by the client and anything that speaks to it.
//!
//! Design goals:
//! - Sparse, explicitly optional snapshot payloads (absent means unchanged).
//! - Clear separation of concerns (math, snapshot data, net, config).
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod net;
pub mod snapshot;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::snapshot::*;
}
