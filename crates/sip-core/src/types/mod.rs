//! Core SIP message types.

pub mod address;
pub mod headers;
pub mod ids;
pub mod message;
pub mod method;
pub mod request;
pub mod response;
pub mod status;
pub mod uri;

pub use address::NameAddr;
pub use headers::{CSeq, CallId, Headers, Via};
pub use message::SipMessage;
pub use method::Method;
pub use request::SipRequest;
pub use response::SipResponse;
pub use status::StatusCode;
pub use uri::SipUri;
