//! Column-selection module

use crate::runtime::attr::{AttrDescriptor, AttrStore, AttrValue};
use crate::runtime::errors::{DeliverResult, NegotiateError};
use crate::runtime::module::{FrameSink, Module};
use crate::runtime::stream::{StreamAttributes, Value};

const MAX_COLUMNS: usize = 64;

/// Keeps the column subset named by the `columns` attribute, in the given
/// order (an index may repeat). An empty list passes all columns through.
///
/// Indices are validated against the upstream format at negotiation time;
/// an out-of-range index rejects the stream rather than silently clamping.
pub struct Select {
    name: String,
    attrs: AttrStore,
    selection: Vec<usize>,
    in_cols: usize,
    rows: usize,
    out: Vec<Value>,
}

impl Select {
    pub fn new() -> Self {
        let mut attrs = AttrStore::new();
        attrs.declare(
            AttrDescriptor::var_ints(
                "columns",
                "indices of the columns to keep, in output order (empty keeps all)",
                true,
                MAX_COLUMNS,
            ),
            AttrValue::Ints(Vec::new()),
        );
        Self {
            name: "select".to_string(),
            attrs,
            selection: Vec::new(),
            in_cols: 0,
            rows: 1,
            out: Vec::new(),
        }
    }

    /// With custom instance name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Select {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Select {
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
        let wanted = self.attrs.ints("columns");

        self.selection.clear();
        if wanted.is_empty() {
            self.selection.extend(0..upstream.columns);
        } else {
            for &idx in &wanted {
                if idx < 0 || idx as usize >= upstream.columns {
                    return Err(NegotiateError::rejected(
                        &self.name,
                        "columns",
                        format!(
                            "index {} out of range for {} input columns",
                            idx, upstream.columns
                        ),
                    ));
                }
                self.selection.push(idx as usize);
            }
        }

        let labels = if upstream.labels.is_empty() {
            Vec::new()
        } else {
            self.selection
                .iter()
                .map(|&i| upstream.labels[i].clone())
                .collect()
        };

        self.in_cols = upstream.columns;
        self.rows = upstream.rows;

        let mut out = upstream.clone();
        out.columns = self.selection.len();
        out.labels = labels;
        self.out.resize(out.max_block * out.values_per_frame(), 0.0);
        Ok(out)
    }

    fn deliver(
        &mut self,
        time: f64,
        frames: &[Value],
        count: usize,
        sink: &mut dyn FrameSink,
    ) -> DeliverResult {
        let out_cols = self.selection.len();
        let total_rows = count * self.rows;

        for r in 0..total_rows {
            let src = r * self.in_cols;
            let dst = r * out_cols;
            for (o, &col) in self.selection.iter().enumerate() {
                self.out[dst + o] = frames[src + col];
            }
        }

        sink.on_frames(time, &self.out[..total_rows * out_cols], count)
    }
}
