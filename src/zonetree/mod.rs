//! Origins and their authority data.
//!
//! An [`OriginTree`] maps domain names to the origin that encloses them.
//! A [`ZoneAuthority`] owns the SOA metadata of a set of origins backed by
//! a common record source and decides whether a transfer request needs a
//! full, an incremental, or no transfer at all.

mod authority;
mod tree;

pub use self::authority::{
    AuthorityError, Origin, SoaParams, XfrClass, XfrPlan, ZoneAuthority,
};
pub use self::tree::{OriginTree, OriginTreeError};
