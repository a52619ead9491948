//! Sequence combinator — chains modules output-to-input
//!
//! Negotiation flows stream attributes left to right: each member's output
//! format becomes the next member's input. Frame delivery is push-style with
//! no intermediate queue: a member emits into a chain sink that forwards
//! straight into the next member's `deliver`, so one input batch cascades
//! through the whole chain within a single call.

use tracing::debug;

use super::attr::{AttrInfo, AttrStore, AttrValue};
use super::errors::{AttrError, DeliverError, DeliverResult, NegotiateError};
use super::module::{route_get, route_list, route_set, FrameSink, Module};
use super::stream::{StreamAttributes, Value};

/// Ordered chain of modules behaving as one module.
pub struct Sequence {
    name: String,
    members: Vec<Box<dyn Module>>,
    attrs: AttrStore,
    out_attrs: Option<StreamAttributes>,
}

impl Sequence {
    pub fn new() -> Self {
        Self {
            name: "seq".to_string(),
            members: Vec::new(),
            attrs: AttrStore::new(),
            out_attrs: None,
        }
    }

    /// With custom instance name (used in attribute paths and errors).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a member to the end of the chain.
    pub fn add(&mut self, module: impl Module + 'static) -> &mut Self {
        self.members.push(Box::new(module));
        self
    }

    /// Append an already boxed member.
    pub fn add_boxed(&mut self, module: Box<dyn Module>) -> &mut Self {
        self.members.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwarder wired as a member's sink: pushes emitted frames into the rest
/// of the chain, terminating at the caller's sink.
struct ChainSink<'a> {
    rest: &'a mut [Box<dyn Module>],
    tail: &'a mut dyn FrameSink,
}

impl FrameSink for ChainSink<'_> {
    fn on_frames(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult {
        deliver_chain(self.rest, time, frames, count, self.tail)
    }
}

/// Push a batch into the first module of `members`; its output cascades
/// through the remaining ones and ends up in `tail`.
fn deliver_chain(
    members: &mut [Box<dyn Module>],
    time: f64,
    frames: &[Value],
    count: usize,
    tail: &mut dyn FrameSink,
) -> DeliverResult {
    match members.split_first_mut() {
        None => tail.on_frames(time, frames, count),
        Some((head, rest)) => {
            let mut sink = ChainSink { rest, tail };
            head.deliver(time, frames, count, &mut sink)
        }
    }
}

impl Module for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn attrs(&self) -> &AttrStore {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut AttrStore {
        &mut self.attrs
    }

    fn get_attr(&self, path: &str) -> Result<AttrValue, AttrError> {
        route_get(&self.members, path)
    }

    fn set_attr(&mut self, path: &str, value: AttrValue) -> Result<(), AttrError> {
        route_set(&mut self.members, path, value)
    }

    fn list_attrs(&self, prefix: &str, out: &mut Vec<AttrInfo>) {
        route_list(&self.members, prefix, out);
    }

    fn negotiate(
        &mut self,
        upstream: &StreamAttributes,
    ) -> Result<StreamAttributes, NegotiateError> {
        if self.members.is_empty() {
            return Err(NegotiateError::rejected(
                &self.name,
                "members",
                "sequence has no members",
            ));
        }

        let mut attrs = upstream.clone();
        for member in &mut self.members {
            attrs = member.negotiate(&attrs)?;
        }

        debug!("sequence '{}' negotiated: {}", self.name, attrs);
        self.out_attrs = Some(attrs.clone());
        Ok(attrs)
    }

    fn deliver(
        &mut self,
        time: f64,
        frames: &[Value],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> DeliverResult {
        if self.out_attrs.is_none() {
            return Err(DeliverError::NotNegotiated);
        }
        deliver_chain(&mut self.members, time, frames, count, sink)
    }

    fn finalize(&mut self, end_time: f64, sink: &mut dyn FrameSink) -> DeliverResult {
        // Each member flushes through the remainder of the chain before the
        // next member learns the stream has ended.
        for i in 0..self.members.len() {
            let (member, rest) = self.members[i..]
                .split_first_mut()
                .expect("index in bounds - bug in finalize loop");
            let mut chain = ChainSink { rest, tail: sink };
            member.finalize(end_time, &mut chain)?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        for member in &mut self.members {
            member.reset();
        }
    }
}
