//! Parallel combinator — fans one stream out to sibling modules and merges
//! their outputs column-wise
//!
//! Every sibling receives an identical copy of each input batch. Siblings
//! must produce frames in lockstep: same rate and rows at negotiation time,
//! same frame count per call at delivery time. Matching frames are merged by
//! concatenating columns and pushed downstream as one batch. Divergent frame
//! counts are a hard fault, never silently dropped or padded; reconciling
//! genuinely different rates is the caller's job (insert a re-blocking
//! module in the slower branch).

use tracing::debug;

use super::attr::{AttrInfo, AttrStore, AttrValue};
use super::errors::{AttrError, DeliverError, DeliverResult, NegotiateError};
use super::module::{route_get, route_list, route_set, FrameSink, Module};
use super::stream::{DomainExtra, StreamAttributes, Value};

/// Per-branch output collected during one deliver call.
#[derive(Default)]
struct BranchState {
    out: Vec<Value>,
    frames: usize,
    time: f64,
    got_time: bool,
}

impl BranchState {
    fn clear(&mut self) {
        self.out.clear();
        self.frames = 0;
        self.time = 0.0;
        self.got_time = false;
    }
}

/// Collects a branch's emitted frames without forwarding them yet.
struct CollectSink<'a> {
    state: &'a mut BranchState,
}

impl FrameSink for CollectSink<'_> {
    fn on_frames(&mut self, time: f64, frames: &[Value], count: usize) -> DeliverResult {
        if !self.state.got_time {
            self.state.time = time;
            self.state.got_time = true;
        }
        self.state.out.extend_from_slice(frames);
        self.state.frames += count;
        Ok(())
    }
}

/// Set of sibling modules behaving as one wider module.
pub struct Parallel {
    name: String,
    branches: Vec<Box<dyn Module>>,
    attrs: AttrStore,
    out_attrs: Option<StreamAttributes>,
    states: Vec<BranchState>,
    merged: Vec<Value>,
    branch_cols: Vec<usize>,
    rows: usize,
}

impl Parallel {
    pub fn new() -> Self {
        Self {
            name: "par".to_string(),
            branches: Vec::new(),
            attrs: AttrStore::new(),
            out_attrs: None,
            states: Vec::new(),
            merged: Vec::new(),
            branch_cols: Vec::new(),
            rows: 1,
        }
    }

    /// With custom instance name (used in attribute paths and errors).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a sibling branch.
    pub fn add(&mut self, module: impl Module + 'static) -> &mut Self {
        self.branches.push(Box::new(module));
        self
    }

    /// Add an already boxed sibling branch.
    pub fn add_boxed(&mut self, module: Box<dyn Module>) -> &mut Self {
        self.branches.push(module);
        self
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Check lockstep, merge collected branch outputs column-wise, and push
    /// the merged batch downstream.
    fn merge_and_push(&mut self, sink: &mut dyn FrameSink) -> DeliverResult {
        let expected = self.states.first().map(|s| s.frames).unwrap_or(0);
        for (branch, state) in self.branches.iter().zip(&self.states) {
            if state.frames != expected {
                return Err(DeliverError::FanoutDesync {
                    module: branch.name().to_string(),
                    produced: state.frames,
                    expected,
                });
            }
        }
        if expected == 0 {
            return Ok(());
        }

        self.merged.clear();
        for frame in 0..expected {
            for row in 0..self.rows {
                for (state, &cols) in self.states.iter().zip(&self.branch_cols) {
                    let start = (frame * self.rows + row) * cols;
                    self.merged.extend_from_slice(&state.out[start..start + cols]);
                }
            }
        }

        let time = self.states.first().map(|s| s.time).unwrap_or(0.0);
        sink.on_frames(time, &self.merged, expected)
    }
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Parallel {
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
        route_get(&self.branches, path)
    }

    fn set_attr(&mut self, path: &str, value: AttrValue) -> Result<(), AttrError> {
        route_set(&mut self.branches, path, value)
    }

    fn list_attrs(&self, prefix: &str, out: &mut Vec<AttrInfo>) {
        route_list(&self.branches, prefix, out);
    }

    fn negotiate(
        &mut self,
        upstream: &StreamAttributes,
    ) -> Result<StreamAttributes, NegotiateError> {
        if self.branches.is_empty() {
            return Err(NegotiateError::rejected(
                &self.name,
                "branches",
                "parallel has no branches",
            ));
        }

        let mut outs = Vec::with_capacity(self.branches.len());
        for branch in &mut self.branches {
            outs.push(branch.negotiate(upstream)?);
        }

        // Siblings must agree on frame rate and frame height to be merged.
        let first = &outs[0];
        for (i, out) in outs.iter().enumerate().skip(1) {
            if out.rate != first.rate {
                return Err(NegotiateError::RateMismatch {
                    field: "rate",
                    left_module: self.branches[0].name().to_string(),
                    left_value: first.rate.to_string(),
                    right_module: self.branches[i].name().to_string(),
                    right_value: out.rate.to_string(),
                });
            }
            if out.rows != first.rows {
                return Err(NegotiateError::RateMismatch {
                    field: "rows",
                    left_module: self.branches[0].name().to_string(),
                    left_value: first.rows.to_string(),
                    right_module: self.branches[i].name().to_string(),
                    right_value: out.rows.to_string(),
                });
            }
        }

        let columns: usize = outs.iter().map(|o| o.columns).sum();

        // Concatenate labels when at least one branch carries them, padding
        // unlabeled branches with empty strings.
        let labels = if outs.iter().any(|o| !o.labels.is_empty()) {
            let mut labels = Vec::with_capacity(columns);
            for out in &outs {
                if out.labels.is_empty() {
                    labels.extend(std::iter::repeat(String::new()).take(out.columns));
                } else {
                    labels.extend(out.labels.iter().cloned());
                }
            }
            labels
        } else {
            Vec::new()
        };

        let extra = if outs.iter().all(|o| o.extra == first.extra) {
            first.extra
        } else {
            DomainExtra::None
        };

        let merged_attrs = StreamAttributes {
            rate: first.rate,
            offset: first.offset,
            columns,
            rows: first.rows,
            labels,
            duration: first.duration,
            extra,
            max_block: first.max_block,
        };

        // Size the per-branch collection buffers and the merge buffer for
        // the worst case of one output frame per input frame.
        self.rows = first.rows;
        self.branch_cols = outs.iter().map(|o| o.columns).collect();
        self.states = outs
            .iter()
            .map(|o| {
                let mut state = BranchState::default();
                state.out.reserve(upstream.max_block * o.values_per_frame());
                state
            })
            .collect();
        self.merged = Vec::with_capacity(upstream.max_block * merged_attrs.values_per_frame());

        debug!(
            "parallel '{}' negotiated {} branches into {}",
            self.name,
            self.branches.len(),
            merged_attrs
        );
        self.out_attrs = Some(merged_attrs.clone());
        Ok(merged_attrs)
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

        for (branch, state) in self.branches.iter_mut().zip(self.states.iter_mut()) {
            state.clear();
            branch.deliver(time, frames, count, &mut CollectSink { state })?;
        }

        self.merge_and_push(sink)
    }

    fn finalize(&mut self, end_time: f64, sink: &mut dyn FrameSink) -> DeliverResult {
        if self.out_attrs.is_none() {
            return Ok(());
        }

        for (branch, state) in self.branches.iter_mut().zip(self.states.iter_mut()) {
            state.clear();
            branch.finalize(end_time, &mut CollectSink { state })?;
        }

        self.merge_and_push(sink)
    }

    fn reset(&mut self) {
        for branch in &mut self.branches {
            branch.reset();
        }
        for state in &mut self.states {
            state.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits one output frame of half the columns per pair of input frames
    /// (first half of the first frame of each pair).
    struct HalvePairs {
        name: String,
        attrs: AttrStore,
        out: Vec<Value>,
        out_cols: usize,
    }

    impl HalvePairs {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                attrs: AttrStore::new(),
                out: Vec::new(),
                out_cols: 0,
            }
        }
    }

    impl Module for HalvePairs {
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
            if upstream.columns < 2 {
                return Err(NegotiateError::rejected(
                    &self.name,
                    "columns",
                    "need at least 2 columns to halve",
                ));
            }
            self.out_cols = upstream.columns / 2;
            let mut out = upstream.clone();
            out.columns = self.out_cols;
            out.rate = upstream.rate / 2.0;
            out.labels.clear();
            self.out.resize(upstream.max_block * self.out_cols, 0.0);
            Ok(out)
        }
        fn deliver(
            &mut self,
            time: f64,
            frames: &[Value],
            count: usize,
            sink: &mut dyn FrameSink,
        ) -> DeliverResult {
            let in_cols = self.out_cols * 2;
            let pairs = count / 2;
            for p in 0..pairs {
                let start = p * 2 * in_cols;
                let dst = p * self.out_cols;
                self.out[dst..dst + self.out_cols]
                    .copy_from_slice(&frames[start..start + self.out_cols]);
            }
            sink.on_frames(time, &self.out[..pairs * self.out_cols], pairs)
        }
    }

    /// Pass-through that keeps its input shape.
    struct Ident {
        name: String,
        attrs: AttrStore,
    }

    impl Ident {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                attrs: AttrStore::new(),
            }
        }
    }

    impl Module for Ident {
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

    fn collect<'a>(
        out: &'a mut Vec<Value>,
        counts: &'a mut Vec<usize>,
    ) -> impl FnMut(f64, &[Value], usize) -> DeliverResult + 'a {
        move |_time, frames, count| {
            out.extend_from_slice(frames);
            counts.push(count);
            Ok(())
        }
    }

    #[test]
    fn test_column_count_is_sum_of_branches() {
        let mut par = Parallel::new();
        par.add(Ident::new("a"));
        par.add(Ident::new("b"));

        let input = StreamAttributes::descriptor(100.0, 3, 8);
        let out = par.negotiate(&input).unwrap();
        assert_eq!(out.columns, 6);
        assert_eq!(out.rate, 100.0);
        assert_eq!(out.rows, 1);
    }

    #[test]
    fn test_rate_mismatch_rejected() {
        let mut par = Parallel::new();
        par.add(Ident::new("full_rate"));
        par.add(HalvePairs::new("half_rate"));

        let input = StreamAttributes::descriptor(100.0, 4, 8);
        let result = par.negotiate(&input);
        match result {
            Err(NegotiateError::RateMismatch {
                field,
                left_module,
                right_module,
                ..
            }) => {
                assert_eq!(field, "rate");
                assert_eq!(left_module, "full_rate");
                assert_eq!(right_module, "half_rate");
            }
            other => panic!("expected RateMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_halving_branches() {
        // Two branches each turning 100 frames of size 4 into 50 frames
        // of size 2 must merge into 50 frames of size 4.
        let mut par = Parallel::new();
        par.add(HalvePairs::new("left"));
        par.add(HalvePairs::new("right"));

        let input = StreamAttributes::descriptor(100.0, 4, 100);
        let out = par.negotiate(&input).unwrap();
        assert_eq!(out.columns, 4);
        assert_eq!(out.rate, 50.0);

        let frames: Vec<Value> = (0..400).map(|i| i as Value).collect();
        let mut merged = Vec::new();
        let mut counts = Vec::new();
        par.deliver(0.0, &frames, 100, &mut collect(&mut merged, &mut counts))
            .unwrap();

        assert_eq!(counts, vec![50]);
        assert_eq!(merged.len(), 200);
        // Both branches emit the first two values of every even input
        // frame, so merged frame p is that pair twice.
        assert_eq!(&merged[..8], &[0.0, 1.0, 0.0, 1.0, 8.0, 9.0, 8.0, 9.0]);
    }

    #[test]
    fn test_desync_is_a_hard_fault() {
        /// Emits one frame per input frame the first call, then none.
        struct Stutter {
            attrs: AttrStore,
            calls: usize,
        }
        impl Module for Stutter {
            fn name(&self) -> &str {
                "stutter"
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
                self.calls += 1;
                if self.calls == 1 {
                    sink.on_frames(time, frames, count)
                } else {
                    Ok(())
                }
            }
        }

        let mut par = Parallel::new();
        par.add(Ident::new("steady"));
        par.add(Stutter {
            attrs: AttrStore::new(),
            calls: 0,
        });

        let input = StreamAttributes::descriptor(100.0, 1, 4);
        par.negotiate(&input).unwrap();

        let mut merged = Vec::new();
        let mut counts = Vec::new();
        par.deliver(0.0, &[1.0, 2.0], 2, &mut collect(&mut merged, &mut counts))
            .unwrap();
        assert_eq!(counts, vec![2]);

        let result = par.deliver(10.0, &[3.0, 4.0], 2, &mut collect(&mut merged, &mut counts));
        match result {
            Err(DeliverError::FanoutDesync {
                module,
                produced,
                expected,
            }) => {
                assert_eq!(module, "stutter");
                assert_eq!(produced, 0);
                assert_eq!(expected, 2);
            }
            other => panic!("expected FanoutDesync, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_concatenated_with_padding() {
        /// Pass-through that adds labels to its output.
        struct Labeled {
            attrs: AttrStore,
        }
        impl Module for Labeled {
            fn name(&self) -> &str {
                "labeled"
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
                Ok(upstream.clone().with_labels(["x", "y"]))
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

        let mut par = Parallel::new();
        par.add(Labeled {
            attrs: AttrStore::new(),
        });
        par.add(Ident::new("plain"));

        let out = par
            .negotiate(&StreamAttributes::descriptor(100.0, 2, 4))
            .unwrap();
        assert_eq!(out.labels, vec!["x", "y", "", ""]);
        assert!(out.check().is_ok());
    }
}
