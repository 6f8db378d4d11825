//! Model
//!
//! Exported trees. A [`TreeModel`] holds one record per node in split order:
//! the root is node 0 and every split appends its `<=` child and then its `>`
//! child. Models round-trip through JSON and through a fixed binary layout,
//! a byte order marker, the root id and the node count followed by
//! `feature:i32, threshold:f64, left:i32, right:i32, parent:i32, weight:f64`
//! per node, with `-1` standing for "none".
use crate::config::JsonIO;
use crate::constants::{BYTE_ORDER_MARK, MODEL_HEADER_SIZE, NODE_RECORD_SIZE};
use crate::errors::SortForestError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    pub feature: Option<usize>,
    pub threshold: f64,
    pub left_child: Option<usize>,
    pub right_child: Option<usize>,
    pub parent: Option<usize>,
    pub weight: f64,
}

impl ModelNode {
    pub fn leaf(parent: Option<usize>, weight: f64) -> Self {
        ModelNode {
            feature: None,
            threshold: 0.0,
            left_child: None,
            right_child: None,
            parent,
            weight,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }

    pub fn children(&self) -> Option<(usize, usize)> {
        match (self.left_child, self.right_child) {
            (Some(l), Some(r)) => Some((l, r)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeModel {
    pub root: usize,
    pub nodes: Vec<ModelNode>,
}

impl JsonIO for TreeModel {}

fn malformed(what: String) -> SortForestError {
    SortForestError::inconsistent("tree model", what)
}

impl TreeModel {
    /// Check that the model is a complete binary tree numbered in split order
    /// whose splits use features below `n_features`.
    pub fn validate(&self, n_features: usize) -> Result<(), SortForestError> {
        let n = self.nodes.len();
        if n == 0 {
            return Err(malformed("the model has no nodes".to_string()));
        }
        if self.root != 0 || self.nodes[0].parent.is_some() {
            return Err(malformed("the root must be node 0 and have no parent".to_string()));
        }
        let mut internal = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.weight.is_nan() {
                return Err(SortForestError::InvalidParameter(
                    format!("weight of node {}", i),
                    "a number".to_string(),
                    "NaN".to_string(),
                ));
            }
            if i > 0 && !matches!(node.parent, Some(p) if p < i) {
                return Err(malformed(format!("node {} has no parent created before it", i)));
            }
            match (node.feature, node.left_child, node.right_child) {
                (None, None, None) => (),
                (Some(f), Some(l), Some(r)) => {
                    if f >= n_features {
                        return Err(SortForestError::FeatureOutOfRange(f, n_features));
                    }
                    if node.threshold.is_nan() {
                        return Err(SortForestError::InvalidParameter(
                            format!("threshold of node {}", i),
                            "a number".to_string(),
                            "NaN".to_string(),
                        ));
                    }
                    if l <= i || r != l + 1 || r >= n {
                        return Err(malformed(format!(
                            "children ({}, {}) of node {} are not numbered in split order",
                            l, r, i
                        )));
                    }
                    if self.nodes[l].parent != Some(i) || self.nodes[r].parent != Some(i) {
                        return Err(malformed(format!("children of node {} do not point back to it", i)));
                    }
                    internal += 1;
                }
                _ => return Err(malformed(format!("node {} is neither a leaf nor a complete split", i))),
            }
        }
        if n != 2 * internal + 1 {
            return Err(malformed(format!("{} nodes cannot hold {} splits", n, internal)));
        }
        Ok(())
    }

    /// Leaf reached by a data point, `value(feature)` giving its feature values.
    pub fn leaf_for<F: Fn(usize) -> f64>(&self, value: F) -> usize {
        let mut idx = self.root;
        while let (Some(f), Some((l, r))) = (self.nodes[idx].feature, self.nodes[idx].children()) {
            idx = if value(f) <= self.nodes[idx].threshold { l } else { r };
        }
        idx
    }

    /// Sum of the weights on the path to the leaf reached by a data point.
    pub fn predict_row<F: Fn(usize) -> f64>(&self, value: F) -> f64 {
        let mut idx = self.root;
        let mut score = self.nodes[idx].weight;
        while let (Some(f), Some((l, r))) = (self.nodes[idx].feature, self.nodes[idx].children()) {
            idx = if value(f) <= self.nodes[idx].threshold { l } else { r };
            score += self.nodes[idx].weight;
        }
        score
    }

    pub fn to_bytes(&self, order: ByteOrder) -> Result<Vec<u8>, SortForestError> {
        let mut w = Writer {
            buf: Vec::with_capacity(MODEL_HEADER_SIZE + NODE_RECORD_SIZE * self.nodes.len()),
            order,
        };
        w.u32(BYTE_ORDER_MARK);
        w.i32(encode_id(Some(self.root))?);
        w.i32(encode_id(Some(self.nodes.len()))?);
        for node in &self.nodes {
            w.i32(encode_id(node.feature)?);
            w.f64(node.threshold);
            w.i32(encode_id(node.left_child)?);
            w.i32(encode_id(node.right_child)?);
            w.i32(encode_id(node.parent)?);
            w.f64(node.weight);
        }
        Ok(w.buf)
    }

    /// Read a model written in either byte order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SortForestError> {
        if bytes.len() < MODEL_HEADER_SIZE {
            return Err(SortForestError::UnableToRead(format!(
                "{} bytes is shorter than a model header",
                bytes.len()
            )));
        }
        let mut marker = [0u8; 4];
        marker.copy_from_slice(&bytes[..4]);
        let order = if u32::from_le_bytes(marker) == BYTE_ORDER_MARK {
            ByteOrder::Little
        } else if u32::from_be_bytes(marker) == BYTE_ORDER_MARK {
            ByteOrder::Big
        } else {
            return Err(SortForestError::BadByteOrderMarker(u32::from_le_bytes(marker)));
        };
        let mut r = Reader { bytes, pos: 4, order };
        let root = decode_id(r.i32()?)?.ok_or_else(|| SortForestError::UnableToRead("missing root id".to_string()))?;
        let count = r.i32()?;
        let count = usize::try_from(count)
            .map_err(|_| SortForestError::UnableToRead(format!("negative node count {}", count)))?;
        let expected = count
            .checked_mul(NODE_RECORD_SIZE)
            .and_then(|b| b.checked_add(MODEL_HEADER_SIZE));
        if expected != Some(bytes.len()) {
            return Err(SortForestError::UnableToRead(format!(
                "{} nodes do not fit {} bytes",
                count,
                bytes.len()
            )));
        }
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let feature = decode_id(r.i32()?)?;
            let threshold = r.f64()?;
            let left_child = decode_id(r.i32()?)?;
            let right_child = decode_id(r.i32()?)?;
            let parent = decode_id(r.i32()?)?;
            let weight = r.f64()?;
            nodes.push(ModelNode {
                feature,
                threshold,
                left_child,
                right_child,
                parent,
                weight,
            });
        }
        Ok(TreeModel { root, nodes })
    }

    pub fn save_binary<P: AsRef<Path>>(&self, path: P, order: ByteOrder) -> Result<(), SortForestError> {
        fs::write(path, self.to_bytes(order)?).map_err(|e| SortForestError::UnableToWrite(e.to_string()))
    }

    pub fn load_binary<P: AsRef<Path>>(path: P) -> Result<Self, SortForestError> {
        let bytes = fs::read(path).map_err(|e| SortForestError::UnableToRead(e.to_string()))?;
        TreeModel::from_bytes(&bytes)
    }
}

fn encode_id(id: Option<usize>) -> Result<i32, SortForestError> {
    match id {
        None => Ok(-1),
        Some(i) => i32::try_from(i)
            .map_err(|_| SortForestError::UnableToWrite(format!("{} does not fit in a 32-bit record field", i))),
    }
}

fn decode_id(v: i32) -> Result<Option<usize>, SortForestError> {
    match v {
        -1 => Ok(None),
        v if v < 0 => Err(SortForestError::UnableToRead(format!("invalid id {} in node record", v))),
        v => Ok(Some(v as usize)),
    }
}

struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn i32(&mut self, v: i32) {
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn f64(&mut self, v: f64) {
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'b> Reader<'b> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], SortForestError> {
        let end = self.pos + N;
        if end > self.bytes.len() {
            return Err(SortForestError::UnableToRead("truncated node record".to_string()));
        }
        let mut b = [0u8; N];
        b.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(b)
    }

    fn i32(&mut self) -> Result<i32, SortForestError> {
        let b = self.take::<4>()?;
        Ok(match self.order {
            ByteOrder::Little => i32::from_le_bytes(b),
            ByteOrder::Big => i32::from_be_bytes(b),
        })
    }

    fn f64(&mut self) -> Result<f64, SortForestError> {
        let b = self.take::<8>()?;
        Ok(match self.order {
            ByteOrder::Little => f64::from_le_bytes(b),
            ByteOrder::Big => f64::from_be_bytes(b),
        })
    }
}
