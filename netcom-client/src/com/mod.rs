//! Hand-rolled COM calling layer: binary layout, object lifetime, string
//! marshaling and collection enumeration.

pub mod abi;
pub mod enumerator;
pub mod object;
pub mod strings;
pub(crate) mod sys;

pub use abi::{GUID, HRESULT};
pub use enumerator::{enumerate, get_enumerator};
pub use object::{
    ClassContext, ComInterface, ComObject, activate, check, out_object, query_interface, release,
};
