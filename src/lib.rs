//! Streaming pipeline framework for real-time descriptor extraction
//!
//! This library provides the composition infrastructure for real-time
//! analysis of multichannel frame streams: independently written processing
//! modules share one contract and are assembled into acyclic graphs that
//! transform one continuous stream into another.
//!
//! # Architecture
//!
//! - **Module**: the processing contract (stream-attribute negotiation,
//!   synchronous push-style frame delivery, reset/finalize lifecycle)
//! - **Attributes**: typed, constrained, introspectable configuration slots
//!   per module, settable by name from host tooling or a control thread
//! - **Sequence / Parallel**: the two combinators for chaining and for
//!   fan-out with column-wise merge
//! - **Pipeline**: the host surface; negotiate once, feed frame batches,
//!   receive output through a registered sink callback
//! - **RingBuffer**: fixed-capacity windowed buffering for re-blocking
//!   between differing frame rates
//!
//! The frame path performs no allocation, locking, or blocking: a `feed`
//! fans out recursively through the graph within the calling thread and
//! returns once every downstream module has run, so a pipeline can live
//! inside a hard real-time audio callback.
//!
//! # Example
//!
//! ```
//! use sigflow::{AttrValue, Pipeline, Sequence, StreamAttributes};
//! use sigflow::modules::{Slice, Thru};
//!
//! let mut chain = Sequence::new();
//! chain.add(Thru::new());
//! chain.add(Slice::new());
//!
//! let mut pipeline = Pipeline::new(chain);
//! pipeline.set_attr("slice.size", AttrValue::Int(16))?;
//! pipeline.set_attr("slice.hop", AttrValue::Int(8))?;
//! pipeline.set_sink(|_time, _frames, count, attrs| {
//!     println!("{} frames of {}x{}", count, attrs.rows, attrs.columns);
//! });
//!
//! pipeline.negotiate(StreamAttributes::audio(16000.0, 64)).unwrap();
//! let block = [0.0f32; 64];
//! pipeline.feed(0.0, &block, 64).unwrap();
//! pipeline.finish(4.0).unwrap();
//! # Ok::<(), sigflow::AttrError>(())
//! ```

pub mod modules;
pub mod runtime;

// Re-export the host-facing surface
pub use runtime::{
    AttrConstraint, AttrDescriptor, AttrError, AttrInfo, AttrKind, AttrStore, AttrType, AttrValue,
    ControlHandle, DeliverError, DeliverResult, DomainExtra, FrameSink, Module, NegotiateError,
    OverflowPolicy, Parallel, Pipeline, RingBuffer, Sequence, SinkFn, StreamAttributes, Value,
};
