//! Channel router: maps a resource kind and scope id to a channel name.

use std::fmt;

use super::EntityKind;

const TRIPS: &str = "trips";
const PLACES: &str = "places";
const ACCOMMODATIONS: &str = "accommodations";
const FILES: &str = "files";
const PLACE_FILES: &str = "place-files";
const SHARES: &str = "shares";

/// A logical event stream. Every kind except trips is partitioned by scope id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Trips,
    Places(String),
    Accommodations(String),
    Files(String),
    PlaceFiles(String),
    Shares(String),
}

impl Channel {
    /// Route `(kind, scope_id)` to its channel. Trips ignore the scope.
    pub fn route(kind: EntityKind, scope_id: &str) -> Self {
        let scope = scope_id.to_string();
        match kind {
            EntityKind::Trip => Channel::Trips,
            EntityKind::Place => Channel::Places(scope),
            EntityKind::Accommodation => Channel::Accommodations(scope),
            EntityKind::File => Channel::Files(scope),
            EntityKind::PlaceFile => Channel::PlaceFiles(scope),
            EntityKind::Share => Channel::Shares(scope),
        }
    }

    /// Parse a channel name produced by [`Channel::name`].
    pub fn parse(name: &str) -> Option<Self> {
        if name == TRIPS {
            return Some(Channel::Trips);
        }
        let (prefix, scope) = name.split_once(':')?;
        if scope.is_empty() {
            return None;
        }
        let scope = scope.to_string();
        match prefix {
            PLACES => Some(Channel::Places(scope)),
            ACCOMMODATIONS => Some(Channel::Accommodations(scope)),
            FILES => Some(Channel::Files(scope)),
            PLACE_FILES => Some(Channel::PlaceFiles(scope)),
            SHARES => Some(Channel::Shares(scope)),
            _ => None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Channel::Trips => EntityKind::Trip,
            Channel::Places(_) => EntityKind::Place,
            Channel::Accommodations(_) => EntityKind::Accommodation,
            Channel::Files(_) => EntityKind::File,
            Channel::PlaceFiles(_) => EntityKind::PlaceFile,
            Channel::Shares(_) => EntityKind::Share,
        }
    }

    pub fn scope_id(&self) -> Option<&str> {
        match self {
            Channel::Trips => None,
            Channel::Places(s)
            | Channel::Accommodations(s)
            | Channel::Files(s)
            | Channel::PlaceFiles(s)
            | Channel::Shares(s) => Some(s),
        }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            Channel::Trips => return f.write_str(TRIPS),
            Channel::Places(_) => PLACES,
            Channel::Accommodations(_) => ACCOMMODATIONS,
            Channel::Files(_) => FILES,
            Channel::PlaceFiles(_) => PLACE_FILES,
            Channel::Shares(_) => SHARES,
        };
        write!(f, "{}:{}", prefix, self.scope_id().unwrap_or_default())
    }
}

/// Channel name for `(kind, scope_id)`.
pub fn channel_name(kind: EntityKind, scope_id: &str) -> String {
    Channel::route(kind, scope_id).name()
}
