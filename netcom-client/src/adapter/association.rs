use std::hash::{Hash, Hasher};

use super::Lifecycle;
use crate::com::ClassContext;
use crate::error::ComResult;
use crate::shell::{AssociationFlags, AssociationString, QueryAssociations};

/// The registered handlers for one extension, ProgID or executable.
///
/// Identified by the association string, compared case-insensitively.
#[derive(Debug)]
pub struct FileAssociation {
    query: Lifecycle<QueryAssociations>,
    association: String,
    key: String,
}

impl FileAssociation {
    /// Activates a fresh query object bound to `association`.
    pub fn open(association: &str, context: ClassContext) -> ComResult<Self> {
        Self::new(QueryAssociations::activate(context)?, association)
    }

    /// Binds an existing query object to `association`.
    ///
    /// # Errors
    /// Returns `Err` if `Init` rejects the association.
    pub fn new(query: QueryAssociations, association: &str) -> ComResult<Self> {
        query.init(AssociationFlags::empty(), association)?;
        Ok(Self {
            query: Lifecycle::new(query, "FileAssociation"),
            association: association.to_string(),
            key: association.to_lowercase(),
        })
    }

    /// The string this object was bound to, as given.
    pub fn association(&self) -> ComResult<&str> {
        self.query.get()?;
        Ok(&self.association)
    }

    /// Reads one association string with a fresh query.
    ///
    /// # Errors
    /// Returns [`UseAfterDispose`](crate::ComError::UseAfterDispose) after
    /// [`dispose`](Self::dispose), or [`CallFailed`](crate::ComError::CallFailed)
    /// when nothing is registered for `kind`.
    pub fn get(&self, kind: AssociationString) -> ComResult<String> {
        self.query
            .get()?
            .get_string(AssociationFlags::NOTRUNCATE, kind, None)
    }

    /// The `open` verb command line.
    pub fn command(&self) -> ComResult<String> {
        self.get(AssociationString::Command)
    }

    /// Path of the handling executable.
    pub fn executable(&self) -> ComResult<String> {
        self.get(AssociationString::Executable)
    }

    pub fn friendly_app_name(&self) -> ComResult<String> {
        self.get(AssociationString::FriendlyAppName)
    }

    pub fn friendly_doc_name(&self) -> ComResult<String> {
        self.get(AssociationString::FriendlyDocName)
    }

    pub fn default_icon(&self) -> ComResult<String> {
        self.get(AssociationString::DefaultIcon)
    }

    /// MIME type, for example `text/plain`.
    pub fn content_type(&self) -> ComResult<String> {
        self.get(AssociationString::ContentType)
    }

    /// Releases the query object. Calling it again does nothing.
    pub fn dispose(&mut self) {
        self.query.dispose();
    }

    pub const fn is_disposed(&self) -> bool {
        self.query.is_disposed()
    }
}

impl PartialEq for FileAssociation {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FileAssociation {}

impl Hash for FileAssociation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}
