//! Module trait for streaming processing
//!
//! Defines the contract every processing module implements, leaf analysis
//! algorithms and combinators alike:
//! - negotiate: receive upstream stream attributes, publish own output format
//! - deliver: receive a batch of frames, push results into a sink
//! - finalize: end of stream, flush any buffered partial output
//! - reset: clear transient state, keep configuration and negotiated format
//!
//! Frame transport is push-style and strictly synchronous: a module emits
//! output by calling its sink from inside `deliver`, which may itself be the
//! next module in a chain. Ordering and real-time boundedness depend on this
//! direct call-and-return shape; nothing here queues or defers.

use super::attr::{AttrInfo, AttrStore, AttrValue};
use super::errors::{AttrError, DeliverResult, NegotiateError};
use super::stream::{StreamAttributes, Value};

/// Downstream consumer of frames emitted by a module.
///
/// `frames` holds `count` frames back to back, each shaped per the emitting
/// module's negotiated output attributes; `time` tags the first frame in ms.
pub trait FrameSink {
    fn on_frames(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult;
}

/// Closures work as sinks, for hosts and tests.
impl<F> FrameSink for F
where
    F: FnMut(f64, &[Value], usize) -> DeliverResult,
{
    fn on_frames(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult {
        self(time, frames, count)
    }
}

/// A processing module that transforms one frame stream into another
///
/// Lifecycle: constructed → configured (attributes set) → negotiated →
/// frames flow (repeatable) → finalize → dropped. `reset` clears transient
/// state without losing configuration or the negotiated format.
///
/// `Send` lets a host hand a fully built pipeline to its streaming thread.
pub trait Module: Send {
    /// Instance name; used in attribute paths and error reports.
    fn name(&self) -> &str;

    /// The module's attribute store (possibly empty).
    fn attrs(&self) -> &AttrStore;

    /// Mutable access to the attribute store.
    fn attrs_mut(&mut self) -> &mut AttrStore;

    /// Read an attribute by path. Combinators resolve dotted paths
    /// (`child.attr`); leaf modules resolve plain names.
    fn get_attr(&self, path: &str) -> Result<AttrValue, AttrError> {
        self.attrs().get(path)
    }

    /// Write an attribute by path. Fails without side effect on unknown
    /// name, kind mismatch, or constraint violation. Takes effect at the
    /// next negotiation or frame boundary, never mid-delivery.
    fn set_attr(&mut self, path: &str, value: AttrValue) -> Result<(), AttrError> {
        self.attrs_mut().set(path, value)
    }

    /// Append one [`AttrInfo`] per reachable attribute, paths prefixed with
    /// `prefix`.
    fn list_attrs(&self, prefix: &str, out: &mut Vec<AttrInfo>) {
        self.attrs().describe(prefix, out);
    }

    /// Validate the upstream format and compute this module's output
    /// format. Idempotent: the same input yields the same output and the
    /// same internal state. Working buffers are sized here so `deliver`
    /// never allocates.
    fn negotiate(&mut self, upstream: &StreamAttributes)
        -> Result<StreamAttributes, NegotiateError>;

    /// Push `count` frames of the negotiated input shape
    /// (`frames.len() == count * values_per_frame`). Zero or more output
    /// batches are emitted through `sink` before this returns. Must not
    /// allocate or block.
    fn deliver(
        &mut self,
        time: f64,
        frames: &[Value],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> DeliverResult;

    /// End of stream: flush buffered partial output through `sink`. Called
    /// at most once per stream run, before any fresh `negotiate`.
    fn finalize(&mut self, _end_time: f64, _sink: &mut dyn FrameSink) -> DeliverResult {
        Ok(())
    }

    /// Clear transient state (buffers, accumulators) without discarding
    /// configuration or negotiated attributes.
    fn reset(&mut self) {}
}

// ── Dotted-path routing shared by the combinators ────────────────────────

pub(crate) fn route_get(
    children: &[Box<dyn Module>],
    path: &str,
) -> Result<AttrValue, AttrError> {
    if let Some((head, rest)) = path.split_once('.') {
        if let Some(child) = children.iter().find(|c| c.name() == head) {
            return child.get_attr(rest);
        }
    }
    Err(AttrError::Unknown {
        path: path.to_string(),
    })
}

pub(crate) fn route_set(
    children: &mut [Box<dyn Module>],
    path: &str,
    value: AttrValue,
) -> Result<(), AttrError> {
    if let Some((head, rest)) = path.split_once('.') {
        if let Some(child) = children.iter_mut().find(|c| c.name() == head) {
            return child.set_attr(rest, value);
        }
    }
    Err(AttrError::Unknown {
        path: path.to_string(),
    })
}

pub(crate) fn route_list(children: &[Box<dyn Module>], prefix: &str, out: &mut Vec<AttrInfo>) {
    for child in children {
        let child_prefix = format!("{}{}.", prefix, child.name());
        child.list_attrs(&child_prefix, out);
    }
}
