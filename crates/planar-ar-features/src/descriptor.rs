//! Row-aligned descriptor matrices.

use serde::{Deserialize, Serialize};

/// Element type of a descriptor matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorKind {
    /// Packed bits, compared by Hamming distance.
    Binary,
    /// `f32` vectors, compared by Euclidean distance.
    Float,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("descriptor element type mismatch (expected {expected:?}, got {got:?})")]
    KindMismatch {
        expected: DescriptorKind,
        got: DescriptorKind,
    },

    #[error("descriptor column count mismatch (expected {expected}, got {got})")]
    ColumnMismatch { expected: usize, got: usize },

    #[error("descriptor buffer of {len} elements is not a multiple of {cols} columns")]
    RaggedBuffer { len: usize, cols: usize },
}

/// One descriptor per row, rows in the same order as their keypoints.
///
/// `cols` counts elements: bytes for binary descriptors, floats for float ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Descriptors {
    Binary { cols: usize, data: Vec<u8> },
    Float { cols: usize, data: Vec<f32> },
}

impl Descriptors {
    pub fn empty_binary(cols: usize) -> Self {
        Descriptors::Binary {
            cols,
            data: Vec::new(),
        }
    }

    pub fn empty_float(cols: usize) -> Self {
        Descriptors::Float {
            cols,
            data: Vec::new(),
        }
    }

    pub fn from_binary(cols: usize, data: Vec<u8>) -> Result<Self, DescriptorError> {
        check_ragged(data.len(), cols)?;
        Ok(Descriptors::Binary { cols, data })
    }

    pub fn from_float(cols: usize, data: Vec<f32>) -> Result<Self, DescriptorError> {
        check_ragged(data.len(), cols)?;
        Ok(Descriptors::Float { cols, data })
    }

    pub fn kind(&self) -> DescriptorKind {
        match self {
            Descriptors::Binary { .. } => DescriptorKind::Binary,
            Descriptors::Float { .. } => DescriptorKind::Float,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Descriptors::Binary { cols, .. } | Descriptors::Float { cols, .. } => *cols,
        }
    }

    pub fn rows(&self) -> usize {
        let (len, cols) = match self {
            Descriptors::Binary { cols, data } => (data.len(), *cols),
            Descriptors::Float { cols, data } => (data.len(), *cols),
        };
        if cols == 0 {
            0
        } else {
            len / cols
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    pub fn binary_row(&self, i: usize) -> Option<&[u8]> {
        match self {
            Descriptors::Binary { cols, data } => data.get(i * cols..(i + 1) * cols),
            Descriptors::Float { .. } => None,
        }
    }

    pub fn float_row(&self, i: usize) -> Option<&[f32]> {
        match self {
            Descriptors::Float { cols, data } => data.get(i * cols..(i + 1) * cols),
            Descriptors::Binary { .. } => None,
        }
    }

    /// Check that `other` can be stacked under or compared with `self`.
    pub fn check_compatible(&self, other: &Descriptors) -> Result<(), DescriptorError> {
        if self.kind() != other.kind() {
            return Err(DescriptorError::KindMismatch {
                expected: self.kind(),
                got: other.kind(),
            });
        }
        if self.cols() != other.cols() {
            return Err(DescriptorError::ColumnMismatch {
                expected: self.cols(),
                got: other.cols(),
            });
        }
        Ok(())
    }

    /// Append the rows of `other` below the rows of `self`.
    pub fn append(&mut self, other: &Descriptors) -> Result<(), DescriptorError> {
        self.check_compatible(other)?;
        match (self, other) {
            (Descriptors::Binary { data, .. }, Descriptors::Binary { data: more, .. }) => {
                data.extend_from_slice(more)
            }
            (Descriptors::Float { data, .. }, Descriptors::Float { data: more, .. }) => {
                data.extend_from_slice(more)
            }
            _ => {}
        }
        Ok(())
    }

    /// Distance between row `i` of `self` and row `j` of `other`.
    ///
    /// Hamming bits for binary rows, Euclidean norm for float rows. `None` if
    /// either row is missing or the kinds differ.
    pub fn distance(&self, i: usize, other: &Descriptors, j: usize) -> Option<f32> {
        match (self, other) {
            (Descriptors::Binary { .. }, Descriptors::Binary { .. }) => {
                Some(hamming(self.binary_row(i)?, other.binary_row(j)?) as f32)
            }
            (Descriptors::Float { .. }, Descriptors::Float { .. }) => {
                Some(l2(self.float_row(i)?, other.float_row(j)?))
            }
            _ => None,
        }
    }
}

fn check_ragged(len: usize, cols: usize) -> Result<(), DescriptorError> {
    if (cols == 0 && len > 0) || (cols > 0 && len % cols != 0) {
        return Err(DescriptorError::RaggedBuffer { len, cols });
    }
    Ok(())
}

#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_stacks_rows() {
        let mut a = Descriptors::from_binary(2, vec![1, 2, 3, 4]).unwrap();
        let b = Descriptors::from_binary(2, vec![5, 6]).unwrap();
        a.append(&b).unwrap();
        assert_eq!(a.rows(), 3);
        assert_eq!(a.binary_row(2), Some(&[5u8, 6][..]));
    }

    #[test]
    fn append_rejects_column_mismatch() {
        let mut a = Descriptors::empty_binary(32);
        let b = Descriptors::from_binary(16, vec![0; 16]).unwrap();
        assert_eq!(
            a.append(&b),
            Err(DescriptorError::ColumnMismatch {
                expected: 32,
                got: 16
            })
        );
    }

    #[test]
    fn append_rejects_kind_mismatch() {
        let mut a = Descriptors::empty_binary(4);
        let b = Descriptors::from_float(4, vec![0.0; 4]).unwrap();
        assert!(matches!(
            a.append(&b),
            Err(DescriptorError::KindMismatch { .. })
        ));
    }

    #[test]
    fn ragged_buffers_are_rejected() {
        assert!(Descriptors::from_binary(3, vec![0; 4]).is_err());
    }

    #[test]
    fn distances() {
        let a = Descriptors::from_binary(1, vec![0b1010_1010, 0xff]).unwrap();
        assert_eq!(a.distance(0, &a, 1), Some(4.0));
        let f = Descriptors::from_float(2, vec![0.0, 0.0, 3.0, 4.0]).unwrap();
        assert_eq!(f.distance(0, &f, 1), Some(5.0));
        assert_eq!(a.distance(0, &f, 0), None);
        assert_eq!(a.distance(5, &a, 0), None);
    }
}
