//! Identity pass-through module

use crate::runtime::attr::AttrStore;
use crate::runtime::errors::{DeliverResult, NegotiateError};
use crate::runtime::module::{FrameSink, Module};
use crate::runtime::stream::{StreamAttributes, Value};

/// Forwards its input stream unchanged.
///
/// Useful as a placeholder branch in a [`Parallel`] (keeping the original
/// columns alongside derived ones) and as a neutral element when building
/// graphs programmatically.
///
/// [`Parallel`]: crate::runtime::parallel::Parallel
pub struct Thru {
    name: String,
    attrs: AttrStore,
}

impl Thru {
    pub fn new() -> Self {
        Self {
            name: "thru".to_string(),
            attrs: AttrStore::new(),
        }
    }

    /// With custom instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Thru {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Thru {
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
        Ok(upstream.clone())
    }

    fn deliver(
        &mut self,
        time: f64,
        frames: &[Value],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> DeliverResult {
        sink.on_frames(time, frames, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::stream::StreamAttributes;

    #[test]
    fn test_passes_attributes_and_frames_unchanged() {
        let mut thru = Thru::new();
        let input = StreamAttributes::descriptor(100.0, 2, 4).with_labels(["a", "b"]);
        let out = thru.negotiate(&input).unwrap();
        assert_eq!(out, input);

        let mut got = Vec::new();
        thru.deliver(5.0, &[1.0, 2.0], 1, &mut |time: f64,
                                                frames: &[Value],
                                                count: usize|
         -> DeliverResult {
            got.push((time, frames.to_vec(), count));
            Ok(())
        })
        .unwrap();
        assert_eq!(got, vec![(5.0, vec![1.0, 2.0], 1)]);
    }
}
