//! Runtime support for streaming descriptor pipelines

pub mod attr;
pub mod errors;
pub mod module;
pub mod parallel;
pub mod pipeline;
pub mod ring;
pub mod sequence;
pub mod stream;

pub use attr::{AttrConstraint, AttrDescriptor, AttrInfo, AttrKind, AttrStore, AttrType, AttrValue};
pub use errors::{AttrError, DeliverError, DeliverResult, NegotiateError};
pub use module::{FrameSink, Module};
pub use parallel::Parallel;
pub use pipeline::{ControlHandle, Pipeline, SinkFn};
pub use ring::{OverflowPolicy, RingBuffer};
pub use sequence::Sequence;
pub use stream::{DomainExtra, StreamAttributes, Value};
