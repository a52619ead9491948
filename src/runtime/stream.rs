//! Core data types for descriptor streams

use std::fmt;

/// Element type of all frame data flowing through a pipeline.
pub type Value = f32;

/// Domain-specific stream metadata carried alongside the structural fields
/// of [`StreamAttributes`].
///
/// Modules that neither produce nor consume the carried variant pass it
/// through untouched; a module that changes the nature of the stream
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DomainExtra {
    /// No domain metadata (time-domain sample or descriptor streams).
    None,
    /// Spectral-domain stream: number of bins and the frequency of the
    /// highest bin in Hz.
    Spectral { bins: usize, max_freq: f64 },
}

impl Default for DomainExtra {
    fn default() -> Self {
        DomainExtra::None
    }
}

/// Negotiated description of the frames flowing between two modules
///
/// One instance describes one hop of a pipeline: how often frames arrive,
/// their shape, and what the columns mean. Instances are created during the
/// setup pass, replaced wholesale on renegotiation, and never mutated while
/// frames are in flight.
///
/// A frame is `rows * columns` values in row-major order; a deliver call
/// carries up to `max_block` frames back to back.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAttributes {
    /// Frame rate in Hz (frames per second of stream time).
    pub rate: f64,
    /// Time offset of the first frame relative to stream start, in ms.
    pub offset: f64,
    /// Values per row.
    pub columns: usize,
    /// Rows per frame (1 for scalar/vector descriptor streams, the window
    /// length for sliced sample streams).
    pub rows: usize,
    /// Column names; either empty or exactly one per column.
    pub labels: Vec<String>,
    /// Time span covered by one frame in ms (0.0 for instantaneous rows).
    pub duration: f64,
    /// Domain-specific metadata.
    pub extra: DomainExtra,
    /// Upper bound on frames per deliver call; downstream modules size
    /// their working buffers from this.
    pub max_block: usize,
}

impl StreamAttributes {
    /// Attributes of a raw single-channel sample stream at the given sample
    /// rate, delivered at most `max_block` samples per call.
    pub fn audio(sample_rate: f64, max_block: usize) -> Self {
        Self {
            rate: sample_rate,
            offset: 0.0,
            columns: 1,
            rows: 1,
            labels: Vec::new(),
            duration: 0.0,
            extra: DomainExtra::None,
            max_block,
        }
    }

    /// Attributes of a descriptor stream: one row of `columns` values per
    /// frame at `rate` Hz.
    pub fn descriptor(rate: f64, columns: usize, max_block: usize) -> Self {
        Self {
            rate,
            offset: 0.0,
            columns,
            rows: 1,
            labels: Vec::new(),
            duration: 0.0,
            extra: DomainExtra::None,
            max_block,
        }
    }

    /// Replace the column labels, consuming self (builder style).
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Number of values in one frame.
    #[inline]
    pub fn values_per_frame(&self) -> usize {
        self.rows * self.columns
    }

    /// Check the structural invariants: positive shape, positive rate, and
    /// labels either absent or one per column. Returns the offending field
    /// name on violation.
    pub fn check(&self) -> Result<(), &'static str> {
        if !(self.rate > 0.0) {
            return Err("rate");
        }
        if self.columns == 0 {
            return Err("columns");
        }
        if self.rows == 0 {
            return Err("rows");
        }
        if self.max_block == 0 {
            return Err("max_block");
        }
        if !self.labels.is_empty() && self.labels.len() != self.columns {
            return Err("labels");
        }
        Ok(())
    }
}

impl fmt::Display for StreamAttributes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Stream[{}x{} @ {}Hz, max_block={}]",
            self.rows, self.columns, self.rate, self.max_block
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_attributes() {
        let attrs = StreamAttributes::audio(44100.0, 256);
        assert_eq!(attrs.columns, 1);
        assert_eq!(attrs.rows, 1);
        assert_eq!(attrs.values_per_frame(), 1);
        assert!(attrs.check().is_ok());
    }

    #[test]
    fn test_labels_invariant() {
        let mut attrs = StreamAttributes::descriptor(100.0, 3, 16);
        assert!(attrs.check().is_ok());

        attrs.labels = vec!["a".to_string(), "b".to_string()];
        assert_eq!(attrs.check(), Err("labels"));

        attrs.labels.push("c".to_string());
        assert!(attrs.check().is_ok());
    }

    #[test]
    fn test_zero_shape_rejected() {
        let mut attrs = StreamAttributes::descriptor(100.0, 2, 16);
        attrs.columns = 0;
        assert_eq!(attrs.check(), Err("columns"));

        let mut attrs = StreamAttributes::descriptor(100.0, 2, 16);
        attrs.rate = 0.0;
        assert_eq!(attrs.check(), Err("rate"));
    }

    #[test]
    fn test_with_labels() {
        let attrs = StreamAttributes::descriptor(100.0, 2, 16).with_labels(["freq", "energy"]);
        assert_eq!(attrs.labels, vec!["freq", "energy"]);
        assert!(attrs.check().is_ok());
    }
}
