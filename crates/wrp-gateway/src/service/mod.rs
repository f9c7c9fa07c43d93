//! HTTP service layer: routes stateless callers to the node that owns a
//! device.

pub mod lookup;
pub mod redirect;

pub use lookup::{header_key, FixedNode, NodeLookup, RedirectKeyFunc};
pub use redirect::{RedirectHandler, ResolvedHook};
