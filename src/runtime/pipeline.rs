//! Pipeline host — drives a module graph from a caller's stream
//!
//! Wraps the root of a module tree (a leaf, or a [`Sequence`]/[`Parallel`]
//! composition) and exposes the outward-facing surface: negotiate once,
//! push frame batches, receive output through a registered sink callback,
//! finalize at end of stream.
//!
//! Attribute writes may also arrive from a lower-rate control thread
//! through a [`ControlHandle`]; they are queued on a channel and applied at
//! the top of the next `feed` call, so a change is never observed partway
//! through a delivery and the frame path takes no locks.
//!
//! [`Sequence`]: super::sequence::Sequence
//! [`Parallel`]: super::parallel::Parallel

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::attr::{AttrInfo, AttrValue};
use super::errors::{AttrError, DeliverError, DeliverResult, NegotiateError};
use super::module::{FrameSink, Module};
use super::stream::{StreamAttributes, Value};

/// Output callback registered by the host: `(time, frames, count, attrs)`.
pub type SinkFn = dyn FnMut(f64, &[Value], usize, &StreamAttributes) + Send;

/// Message queued by a [`ControlHandle`].
enum ControlMsg {
    Set { path: String, value: AttrValue },
}

/// Cloneable handle for setting attributes from a control thread.
///
/// Sets are fire-and-forget: they are validated when the pipeline applies
/// them at the next frame boundary, and invalid ones are logged and
/// dropped. Use [`Pipeline::set_attr`] for synchronous error reporting.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<ControlMsg>,
}

impl ControlHandle {
    /// Queue an attribute write. Returns false if the pipeline is gone.
    pub fn set(&self, path: impl Into<String>, value: AttrValue) -> bool {
        self.tx
            .send(ControlMsg::Set {
                path: path.into(),
                value,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Graph assembled, stream format unknown.
    Built,
    /// Negotiated; frames may flow.
    Ready,
    /// Finalized; renegotiate to start a fresh run.
    Done,
}

/// Adapter handing the root module's output to the registered callback
/// together with the negotiated output attributes.
struct HostSink<'a> {
    cb: Option<&'a mut SinkFn>,
    attrs: &'a StreamAttributes,
}

impl FrameSink for HostSink<'_> {
    fn on_frames(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult {
        if let Some(cb) = self.cb.as_mut() {
            cb(time, frames, count, self.attrs);
        }
        Ok(())
    }
}

/// A module graph plus the state needed to stream through it.
pub struct Pipeline {
    root: Box<dyn Module>,
    sink: Option<Box<SinkFn>>,
    in_attrs: Option<StreamAttributes>,
    out_attrs: Option<StreamAttributes>,
    state: State,
    control_tx: Sender<ControlMsg>,
    control_rx: Receiver<ControlMsg>,
}

impl Pipeline {
    /// Wrap a root module (leaf or combinator tree).
    pub fn new(root: impl Module + 'static) -> Self {
        let (control_tx, control_rx) = unbounded();
        Self {
            root: Box::new(root),
            sink: None,
            in_attrs: None,
            out_attrs: None,
            state: State::Built,
            control_tx,
            control_rx,
        }
    }

    /// Register the output callback, invoked synchronously from inside
    /// `feed`/`finish` whenever the graph produces output.
    pub fn set_sink(
        &mut self,
        sink: impl FnMut(f64, &[Value], usize, &StreamAttributes) + Send + 'static,
    ) {
        self.sink = Some(Box::new(sink));
    }

    /// Handle for queueing attribute writes from another thread.
    pub fn control(&self) -> ControlHandle {
        ControlHandle {
            tx: self.control_tx.clone(),
        }
    }

    /// Flow stream attributes from the source through the whole graph.
    /// On success the pipeline is ready for `feed`; the returned attributes
    /// describe the frames the sink will receive.
    pub fn negotiate(
        &mut self,
        source: StreamAttributes,
    ) -> Result<&StreamAttributes, NegotiateError> {
        if let Err(field) = source.check() {
            return Err(NegotiateError::rejected(
                "source",
                field,
                "invalid source stream attributes",
            ));
        }

        self.apply_pending();

        let out = self.root.negotiate(&source)?;
        if let Err(field) = out.check() {
            return Err(NegotiateError::rejected(self.root.name(), field, format!(
                "module produced invalid output attributes ({})",
                out
            )));
        }

        info!("pipeline negotiated: {} -> {}", source, out);
        self.in_attrs = Some(source);
        self.state = State::Ready;
        Ok(&*self.out_attrs.insert(out))
    }

    /// Output attributes of the last successful negotiation.
    pub fn output_attrs(&self) -> Option<&StreamAttributes> {
        self.out_attrs.as_ref()
    }

    /// Push `count` frames of the negotiated source shape into the graph.
    /// All resulting output reaches the sink before this returns. A failure
    /// poisons the run: reset and renegotiate before feeding again.
    pub fn feed(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult {
        if self.state != State::Ready {
            return Err(DeliverError::NotNegotiated);
        }
        self.apply_pending();

        let in_attrs = self.in_attrs.as_ref().ok_or(DeliverError::NotNegotiated)?;
        let expected = count * in_attrs.values_per_frame();
        if frames.len() != expected {
            return Err(DeliverError::BadBatch {
                expected,
                got: frames.len(),
            });
        }
        if count > in_attrs.max_block {
            return Err(DeliverError::BlockTooLarge {
                max_block: in_attrs.max_block,
                count,
            });
        }

        let out_attrs = self.out_attrs.as_ref().ok_or(DeliverError::NotNegotiated)?;
        let mut sink = HostSink {
            cb: self.sink.as_deref_mut(),
            attrs: out_attrs,
        };
        let result = self.root.deliver(time, frames, count, &mut sink);
        if result.is_err() {
            // a failed run cannot resume; reset and renegotiate first
            self.state = State::Built;
        }
        result
    }

    /// Signal end of stream: buffered partial output is flushed to the
    /// sink. A fresh `negotiate` starts the next run.
    pub fn finish(&mut self, end_time: f64) -> DeliverResult {
        if self.state != State::Ready {
            return Err(DeliverError::NotNegotiated);
        }

        let out_attrs = self.out_attrs.as_ref().ok_or(DeliverError::NotNegotiated)?;
        let mut sink = HostSink {
            cb: self.sink.as_deref_mut(),
            attrs: out_attrs,
        };
        let result = self.root.finalize(end_time, &mut sink);
        self.state = State::Done;
        debug!("pipeline finalized at {}ms", end_time);
        result
    }

    /// Clear all transient module state (buffers, accumulators), keeping
    /// configuration and negotiated attributes.
    pub fn reset(&mut self) {
        self.root.reset();
    }

    /// Synchronous attribute write with error reporting.
    pub fn set_attr(&mut self, path: &str, value: AttrValue) -> Result<(), AttrError> {
        self.root.set_attr(path, value)
    }

    /// Synchronous attribute read.
    pub fn get_attr(&self, path: &str) -> Result<AttrValue, AttrError> {
        self.root.get_attr(path)
    }

    /// Introspect every attribute reachable from the root.
    pub fn list_attrs(&self) -> Vec<AttrInfo> {
        let mut out = Vec::new();
        self.root.list_attrs("", &mut out);
        out
    }

    /// Apply queued control-thread attribute writes. Runs at negotiation
    /// time and at the top of each feed, never mid-delivery.
    fn apply_pending(&mut self) {
        while let Ok(msg) = self.control_rx.try_recv() {
            match msg {
                ControlMsg::Set { path, value } => {
                    if let Err(e) = self.root.set_attr(&path, value) {
                        warn!("control set '{}' dropped: {}", path, e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Thru;
    use crate::runtime::sequence::Sequence;
    use std::sync::{Arc, Mutex};

    fn capture() -> (
        Arc<Mutex<Vec<(f64, Vec<Value>, usize)>>>,
        impl FnMut(f64, &[Value], usize, &StreamAttributes) + Send + 'static,
    ) {
        let store = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&store);
        let sink = move |time: f64, frames: &[Value], count: usize, _attrs: &StreamAttributes| {
            writer.lock().unwrap().push((time, frames.to_vec(), count));
        };
        (store, sink)
    }

    #[test]
    fn test_identity_chain_end_to_end() {
        // Two pass-through modules, 100 frames of size 4 at 16 kHz:
        // output attributes and frames must equal the input exactly.
        let mut chain = Sequence::new();
        chain.add(Thru::new());
        chain.add(Thru::new());

        let mut pipeline = Pipeline::new(chain);
        let (store, sink) = capture();
        pipeline.set_sink(sink);

        let source = StreamAttributes::descriptor(16000.0, 4, 100);
        let out = pipeline.negotiate(source.clone()).unwrap();
        assert_eq!(*out, source);

        let frames: Vec<Value> = (0..400).map(|i| i as Value).collect();
        pipeline.feed(0.0, &frames, 100).unwrap();
        pipeline.finish(100.0 * 1000.0 / 16000.0).unwrap();

        let got = store.lock().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].2, 100);
        assert_eq!(got[0].1, frames, "identity chain preserves every value in order");
    }

    #[test]
    fn test_feed_before_negotiate_fails() {
        let mut pipeline = Pipeline::new(Thru::new());
        let result = pipeline.feed(0.0, &[1.0], 1);
        assert!(matches!(result, Err(DeliverError::NotNegotiated)));
    }

    #[test]
    fn test_feed_after_finish_fails() {
        let mut pipeline = Pipeline::new(Thru::new());
        pipeline
            .negotiate(StreamAttributes::descriptor(100.0, 1, 4))
            .unwrap();
        pipeline.feed(0.0, &[1.0], 1).unwrap();
        pipeline.finish(10.0).unwrap();

        let result = pipeline.feed(20.0, &[2.0], 1);
        assert!(matches!(result, Err(DeliverError::NotNegotiated)));

        // A fresh negotiation starts a new run.
        pipeline
            .negotiate(StreamAttributes::descriptor(100.0, 1, 4))
            .unwrap();
        pipeline.feed(0.0, &[3.0], 1).unwrap();
    }

    #[test]
    fn test_bad_batch_shape_rejected() {
        let mut pipeline = Pipeline::new(Thru::new());
        pipeline
            .negotiate(StreamAttributes::descriptor(100.0, 2, 4))
            .unwrap();

        let result = pipeline.feed(0.0, &[1.0, 2.0, 3.0], 2);
        assert!(matches!(
            result,
            Err(DeliverError::BadBatch { expected: 4, got: 3 })
        ));

        let result = pipeline.feed(0.0, &[1.0; 10], 5);
        assert!(matches!(
            result,
            Err(DeliverError::BlockTooLarge { max_block: 4, count: 5 })
        ));
    }

    #[test]
    fn test_invalid_source_attributes_rejected() {
        let mut pipeline = Pipeline::new(Thru::new());
        let mut source = StreamAttributes::descriptor(100.0, 2, 4);
        source.labels = vec!["only_one".to_string()];

        let result = pipeline.negotiate(source);
        match result {
            Err(NegotiateError::FormatRejected { module, field, .. }) => {
                assert_eq!(module, "source");
                assert_eq!(field, "labels");
            }
            other => panic!("expected FormatRejected, got {:?}", other),
        }
    }

    #[test]
    fn test_control_set_applies_at_frame_boundary() {
        let mut chain = Sequence::new();
        chain.add(crate::modules::Constant::new());

        let mut pipeline = Pipeline::new(chain);
        pipeline
            .negotiate(StreamAttributes::descriptor(100.0, 1, 4))
            .unwrap();

        let control = pipeline.control();
        assert!(control.set("constant.value", AttrValue::Floats(vec![9.0])));

        // The queued set is applied before the next feed delivers, and its
        // stream-changing nature takes effect on renegotiation.
        pipeline.feed(0.0, &[1.0], 1).unwrap();
        assert_eq!(
            pipeline.get_attr("constant.value").unwrap(),
            AttrValue::Floats(vec![9.0])
        );
    }

    #[test]
    fn test_attr_paths_route_through_nested_combinators() {
        let mut inner = Sequence::new().with_name("analysis");
        inner.add(crate::modules::Constant::new());
        let mut outer = Sequence::new();
        outer.add(Thru::new());
        outer.add_boxed(Box::new(inner));

        let pipeline = {
            let mut p = Pipeline::new(outer);
            p.set_attr(
                "analysis.constant.value",
                AttrValue::Floats(vec![1.5, 2.5]),
            )
            .unwrap();
            p
        };

        assert_eq!(
            pipeline.get_attr("analysis.constant.value").unwrap(),
            AttrValue::Floats(vec![1.5, 2.5])
        );

        let listed = pipeline.list_attrs();
        assert!(listed.iter().any(|a| a.path == "analysis.constant.value"));
    }
}
