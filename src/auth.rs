//! Auth-domain identifiers, token models, and the signed assertion used for issuance.

pub mod assertion;
pub mod id;
pub mod token;

pub use assertion::*;
pub use id::*;
pub use token::{record::*, secret::*};
