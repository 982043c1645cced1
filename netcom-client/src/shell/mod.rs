//! Shell file-association queries (`IQueryAssociations`, shlwapi).

mod association;
mod types;

pub use association::QueryAssociations;
pub use types::{AssociationFlags, AssociationString};

use crate::com::GUID;

pub const CLSID_QUERY_ASSOCIATIONS: GUID =
    GUID::from_u128(0xA07034FD_6CAA_4954_AC3F_97A27216F98A);
pub const IID_IQUERY_ASSOCIATIONS: GUID =
    GUID::from_u128(0xC46CA590_3C3F_11D2_BEE6_0000F805CA57);
