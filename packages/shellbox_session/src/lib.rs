//! Session identity and terminal tab multiplexing primitives for Shellbox.

pub mod error;
pub mod identity;
pub mod mux;

pub use error::{MuxPolicyRejection, ValidationError};
pub use identity::{
    BucketName, CompoundSessionKey, ContainerId, FieldSource, SessionId, TerminalId,
    derive_container_id, extract_session_id_from_source, parse_compound_key, validate_session_id,
};
pub use mux::{
    MuxAction, MuxIntent, MuxOutcome, Presentation, SessionMux, SessionMuxState, TerminalTab,
    TilingConfig, TilingLayout,
};
