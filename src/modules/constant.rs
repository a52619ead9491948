//! Constant-column module

use crate::runtime::attr::{AttrDescriptor, AttrStore, AttrValue};
use crate::runtime::errors::{DeliverResult, NegotiateError};
use crate::runtime::module::{FrameSink, Module};
use crate::runtime::stream::{StreamAttributes, Value};

const DEFAULT_LABEL: &str = "constant";
const MAX_ADDED: usize = 16;

/// Appends columns holding constant values to every row.
///
/// The number of added columns is the longer of the `value` and `label`
/// attribute lists; the shorter list is padded (values with 0, labels with
/// `"constant"`). Changing either list changes the output format, so it
/// takes effect at the next negotiation.
pub struct Constant {
    name: String,
    attrs: AttrStore,
    consts: Vec<Value>,
    in_cols: usize,
    rows: usize,
    out: Vec<Value>,
}

impl Constant {
    pub fn new() -> Self {
        let mut attrs = AttrStore::new();
        attrs.declare(
            AttrDescriptor::var_floats("value", "values of the added columns", true, MAX_ADDED),
            AttrValue::Floats(vec![0.0]),
        );
        attrs.declare(
            AttrDescriptor::var_strs("label", "names of the added columns", true, MAX_ADDED),
            AttrValue::Strs(vec![DEFAULT_LABEL.to_string()]),
        );
        Self {
            name: "constant".to_string(),
            attrs,
            consts: Vec::new(),
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

impl Default for Constant {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Constant {
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
        let values = self.attrs.floats("value");
        let names = self.attrs.strs("label");
        let added = values.len().max(names.len());
        if added == 0 {
            return Err(NegotiateError::rejected(
                &self.name,
                "value",
                "no constant columns configured",
            ));
        }

        // Pad the shorter list up to the added column count.
        self.consts = (0..added)
            .map(|i| values.get(i).copied().unwrap_or(0.0) as Value)
            .collect();

        let mut labels = if upstream.labels.is_empty() {
            vec![String::new(); upstream.columns]
        } else {
            upstream.labels.clone()
        };
        for i in 0..added {
            labels.push(
                names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            );
        }

        self.in_cols = upstream.columns;
        self.rows = upstream.rows;

        let mut out = upstream.clone();
        out.columns = upstream.columns + added;
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
        let in_cols = self.in_cols;
        let out_cols = in_cols + self.consts.len();
        let total_rows = count * self.rows;

        for r in 0..total_rows {
            let src = r * in_cols;
            let dst = r * out_cols;
            self.out[dst..dst + in_cols].copy_from_slice(&frames[src..src + in_cols]);
            self.out[dst + in_cols..dst + out_cols].copy_from_slice(&self.consts);
        }

        sink.on_frames(time, &self.out[..total_rows * out_cols], count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(out: &mut Vec<Value>) -> impl FnMut(f64, &[Value], usize) -> DeliverResult + '_ {
        move |_time, frames, _count| {
            out.extend_from_slice(frames);
            Ok(())
        }
    }

    #[test]
    fn test_appends_constant_columns() {
        let mut module = Constant::new();
        module
            .set_attr("value", AttrValue::Floats(vec![7.0, 8.0]))
            .unwrap();

        let input = StreamAttributes::descriptor(100.0, 2, 4).with_labels(["a", "b"]);
        let out = module.negotiate(&input).unwrap();
        assert_eq!(out.columns, 4);
        assert_eq!(out.labels, vec!["a", "b", "constant", "constant"]);
        assert!(out.check().is_ok());

        let mut got = Vec::new();
        module
            .deliver(0.0, &[1.0, 2.0, 3.0, 4.0], 2, &mut collect(&mut got))
            .unwrap();
        assert_eq!(got, vec![1.0, 2.0, 7.0, 8.0, 3.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn test_label_list_sets_column_count() {
        let mut module = Constant::new();
        module
            .set_attr(
                "label",
                AttrValue::Strs(vec!["onset".to_string(), "rms".to_string()]),
            )
            .unwrap();

        let input = StreamAttributes::descriptor(100.0, 1, 4);
        let out = module.negotiate(&input).unwrap();
        // one value configured, two labels: labels win, values pad with 0
        assert_eq!(out.columns, 3);
        assert_eq!(out.labels, vec!["", "onset", "rms"]);

        let mut got = Vec::new();
        module.deliver(0.0, &[5.0], 1, &mut collect(&mut got)).unwrap();
        assert_eq!(got, vec![5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_multirow_frames_get_constants_per_row() {
        let mut module = Constant::new();
        let mut input = StreamAttributes::descriptor(100.0, 1, 2);
        input.rows = 2;

        let out = module.negotiate(&input).unwrap();
        assert_eq!(out.columns, 2);
        assert_eq!(out.rows, 2);

        let mut got = Vec::new();
        module
            .deliver(0.0, &[1.0, 2.0], 1, &mut collect(&mut got))
            .unwrap();
        assert_eq!(got, vec![1.0, 0.0, 2.0, 0.0]);
    }
}
