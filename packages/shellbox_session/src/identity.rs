//! Session, terminal, and container identifiers.
//!
//! Every identifier that reaches container addressing passes through this
//! module first. Checks are purely syntactic; whether a container actually
//! exists is decided later by the caller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const SESSION_ID_MIN_LEN: usize = 8;
pub const SESSION_ID_MAX_LEN: usize = 24;
pub const SESSION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of ids produced by [`SessionId::generate`].
pub const SESSION_ID_GENERATED_LEN: usize = 16;

const _: () = assert!(
    SESSION_ID_GENERATED_LEN >= SESSION_ID_MIN_LEN
        && SESSION_ID_GENERATED_LEN <= SESSION_ID_MAX_LEN
);

/// Query/body field carrying a session id.
pub const SESSION_ID_FIELD: &str = "sessionId";

/// Maximum number of terminal tabs in one session.
pub const MAX_TABS: usize = 6;

// --- SessionId ---

/// A session id that has passed [`validate_session_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Allocate a fresh random id from the same alphabet the validator accepts.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id: String = (0..SESSION_ID_GENERATED_LEN)
            .map(|_| SESSION_ID_ALPHABET[rng.random_range(0..SESSION_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_session_id(Some(s))
    }
}

impl TryFrom<String> for SessionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_session_id(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidSessionId)
        }
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

fn is_valid_session_id(raw: &str) -> bool {
    (SESSION_ID_MIN_LEN..=SESSION_ID_MAX_LEN).contains(&raw.len())
        && raw.bytes().all(|b| SESSION_ID_ALPHABET.contains(&b))
}

/// Validate a raw session id. `None` and `""` are both rejected.
///
/// The error never echoes `raw`.
pub fn validate_session_id(raw: Option<&str>) -> Result<SessionId, ValidationError> {
    match raw {
        Some(s) if is_valid_session_id(s) => Ok(SessionId(s.to_string())),
        _ => Err(ValidationError::InvalidSessionId),
    }
}

// --- TerminalId ---

/// One of the six sub-terminal slots in a session, `"1"` through `"6"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TerminalId(u8);

impl TerminalId {
    /// The permanent first tab.
    pub const PRIMARY: TerminalId = TerminalId(1);

    pub const ALL: [TerminalId; MAX_TABS] = [
        TerminalId(1),
        TerminalId(2),
        TerminalId(3),
        TerminalId(4),
        TerminalId(5),
        TerminalId(6),
    ];

    pub fn new(n: u8) -> Option<Self> {
        (1..=MAX_TABS as u8).contains(&n).then_some(Self(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn is_primary(self) -> bool {
        self == Self::PRIMARY
    }

    pub fn as_str(self) -> &'static str {
        ["1", "2", "3", "4", "5", "6"][(self.0 - 1) as usize]
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TerminalId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [d @ b'1'..=b'6'] => Ok(Self(d - b'0')),
            _ => Err(ValidationError::InvalidTerminalId),
        }
    }
}

impl TryFrom<String> for TerminalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TerminalId> for String {
    fn from(id: TerminalId) -> Self {
        id.as_str().to_string()
    }
}

// --- CompoundSessionKey ---

/// `<session>` or `<session>-<terminal>`, as it appears in a route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundSessionKey {
    session: SessionId,
    terminal: Option<TerminalId>,
}

impl CompoundSessionKey {
    pub fn new(session: SessionId, terminal: Option<TerminalId>) -> Self {
        Self { session, terminal }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// The addressed terminal; `"1"` when the key carried no suffix.
    pub fn terminal_id(&self) -> TerminalId {
        self.terminal.unwrap_or(TerminalId::PRIMARY)
    }

    pub fn has_terminal_suffix(&self) -> bool {
        self.terminal.is_some()
    }
}

impl fmt::Display for CompoundSessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terminal {
            Some(t) => write!(f, "{}-{}", self.session, t),
            None => write!(f, "{}", self.session),
        }
    }
}

impl FromStr for CompoundSessionKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_compound_key(s)
    }
}

/// Split and validate `<session>[-<terminal>]`.
pub fn parse_compound_key(raw: &str) -> Result<CompoundSessionKey, ValidationError> {
    let (session, terminal) = match raw.split_once('-') {
        Some((session, terminal)) => (session, Some(terminal.parse::<TerminalId>()?)),
        None => (raw, None),
    };
    Ok(CompoundSessionKey {
        session: validate_session_id(Some(session))?,
        terminal,
    })
}

// --- BucketName / ContainerId ---

/// Name of the durable storage unit a container must be bound to.
/// Comes from configuration, never from a client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ValidationError::InvalidBucketName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BucketName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `"<bucket>-<session>"`. Only a validated [`SessionId`] can get here.
pub fn derive_container_id(bucket: &BucketName, session: &SessionId) -> ContainerId {
    ContainerId(format!("{}-{}", bucket, session))
}

// --- Field sources ---

/// Anything a single named string field can be read from (query
/// parameters, form bodies, headers already collected into a map).
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for [(&str, &str)] {
    fn field(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
    }
}

/// Read the `sessionId` field and validate it. A missing field is
/// rejected exactly like an empty one.
pub fn extract_session_id_from_source<S: FieldSource + ?Sized>(
    source: &S,
) -> Result<SessionId, ValidationError> {
    validate_session_id(Some(source.field(SESSION_ID_FIELD).unwrap_or("")))
}
