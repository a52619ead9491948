//! Stream re-blocking module
//!
//! Slices a continuous sample stream into frames of `size` rows emitted
//! every `hop` input frames, the building block in front of any windowed
//! analysis (short-time spectra, envelopes). Overlap (`hop < size`) and
//! gapped reads (`hop > size`) are both supported.

use tracing::debug;

use crate::runtime::attr::{AttrDescriptor, AttrStore, AttrValue};
use crate::runtime::errors::{DeliverError, DeliverResult, NegotiateError};
use crate::runtime::module::{FrameSink, Module};
use crate::runtime::ring::{OverflowPolicy, RingBuffer};
use crate::runtime::stream::{StreamAttributes, Value};

/// Re-blocks its input into overlapped frames via a ring buffer.
///
/// Multicolumn input is reduced to the first value of each frame (column 0
/// of row 0); slicing a specific descriptor column means putting a
/// [`Select`] in front. Output frames are column vectors of `size` rows at
/// `rate / hop` Hz; frame times refer to the window center.
///
/// [`Select`]: super::select::Select
pub struct Slice {
    name: String,
    attrs: AttrStore,
    ring: Option<RingBuffer<Value>>,
    frame: Vec<Value>,
    size: usize,
    hop: usize,
    stride: usize,
    in_rate: f64,
    /// Input frames left to discard after a window when `hop > size`.
    skip: usize,
}

impl Slice {
    pub fn new() -> Self {
        let mut attrs = AttrStore::new();
        attrs.declare(
            AttrDescriptor::int("size", "frame size in input frames", true).range_int(1, 65536),
            AttrValue::Int(2048),
        );
        attrs.declare(
            AttrDescriptor::int("hop", "hop size in input frames", true).range_int(1, 65536),
            AttrValue::Int(512),
        );
        Self {
            name: "slice".to_string(),
            attrs,
            ring: None,
            frame: Vec::new(),
            size: 0,
            hop: 0,
            stride: 0,
            in_rate: 0.0,
            skip: 0,
        }
    }

    /// With custom instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Slice {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Slice {
    fn name(&self) -> &str {
        &self.name
    }

    fn attrs(&self) -> &AttrStore {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut AttrStore {
        &mut self.attrs
    }

    fn negotiate(
        &mut self,
        upstream: &StreamAttributes,
    ) -> Result<StreamAttributes, NegotiateError> {
        let size = self.attrs.int("size") as usize;
        let hop = self.attrs.int("hop") as usize;

        self.size = size;
        self.hop = hop;
        self.stride = upstream.values_per_frame();
        self.in_rate = upstream.rate;
        self.ring = Some(RingBuffer::new(size, OverflowPolicy::Reject));
        self.frame = vec![0.0; size];
        self.skip = 0;

        let mut out = upstream.clone();
        out.rows = size;
        out.columns = 1;
        out.rate = upstream.rate / hop as f64;
        // window-centered frame times: shift the stream onset by half a window
        out.offset = upstream.offset + 500.0 * size as f64 / upstream.rate;
        out.duration = 1000.0 * size as f64 / upstream.rate;
        out.labels = upstream.labels.first().cloned().into_iter().collect();
        out.max_block = 1;

        debug!(
            "slice '{}': {} rows every {} input frames ({} Hz out)",
            self.name, size, hop, out.rate
        );
        Ok(out)
    }

    fn deliver(
        &mut self,
        time: f64,
        frames: &[Value],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> DeliverResult {
        let ring = self.ring.as_mut().ok_or(DeliverError::NotNegotiated)?;
        let consume = self.hop.min(self.size);

        for f in 0..count {
            if self.skip > 0 {
                self.skip -= 1;
                continue;
            }

            ring.write(&frames[f * self.stride..f * self.stride + 1]);
            if ring.available_for_read() == self.size {
                let frame_time =
                    time + 1000.0 * ((f + 1) as f64 - 0.5 * self.size as f64) / self.in_rate;
                ring.read_window(&mut self.frame, consume)?;
                sink.on_frames(frame_time, &self.frame, 1)?;
                if self.hop > self.size {
                    self.skip = self.hop - self.size;
                }
            }
        }

        Ok(())
    }

    // Partial windows are dropped at end of stream; only whole frames are
    // ever emitted.

    fn reset(&mut self) {
        if let Some(ring) = self.ring.as_mut() {
            ring.reset();
        }
        self.skip = 0;
    }
}
