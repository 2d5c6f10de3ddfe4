use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// A binned axis. Bin index 0 is underflow and `n_bins + 1` is overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinAxis {
    Regular {
        name: String,
        bins: usize,
        range: (f64, f64),
    },
    Variable {
        name: String,
        edges: Vec<f64>,
    },
}

impl BinAxis {
    pub fn regular(name: &str, bins: usize, range: (f64, f64)) -> Result<Self> {
        if bins == 0 || range.0.partial_cmp(&range.1) != Some(std::cmp::Ordering::Less) {
            return Err(AnalysisError::Histogram(format!(
                "axis '{name}' needs bins > 0 and low < high"
            )));
        }
        Ok(BinAxis::Regular {
            name: name.to_string(),
            bins,
            range,
        })
    }

    pub fn variable(name: &str, edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::Histogram(format!(
                "axis '{name}' needs at least two increasing edges"
            )));
        }
        Ok(BinAxis::Variable {
            name: name.to_string(),
            edges,
        })
    }

    pub fn bins(&self) -> usize {
        match self {
            BinAxis::Regular { bins, .. } => *bins,
            BinAxis::Variable { edges, .. } => edges.len() - 1,
        }
    }

    /// Bins including underflow and overflow.
    pub fn extent(&self) -> usize {
        self.bins() + 2
    }

    /// Flow-inclusive bin index for a value. NaN lands in overflow.
    pub fn index(&self, value: f64) -> usize {
        match self {
            BinAxis::Regular { bins, range, .. } => {
                if value < range.0 {
                    0
                } else if value >= range.1 || value.is_nan() {
                    bins + 1
                } else {
                    let width = (range.1 - range.0) / *bins as f64;
                    let bin = ((value - range.0) / width) as usize;
                    bin.min(bins - 1) + 1
                }
            }
            BinAxis::Variable { edges, .. } => {
                if value.is_nan() {
                    edges.len()
                } else {
                    // count of edges <= value: 0 below the first edge, n+1 at or above the last
                    edges.partition_point(|e| *e <= value)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_index_with_flow() {
        let axis = BinAxis::regular("pt", 200, (0.0, 1000.0)).unwrap();
        assert_eq!(axis.extent(), 202);
        assert_eq!(axis.index(-1.0), 0);
        assert_eq!(axis.index(0.0), 1);
        assert_eq!(axis.index(4.99), 1);
        assert_eq!(axis.index(5.0), 2);
        assert_eq!(axis.index(999.9), 200);
        assert_eq!(axis.index(1000.0), 201);
        assert_eq!(axis.index(f64::NAN), 201);
    }

    #[test]
    fn variable_index_with_flow() {
        let axis = BinAxis::variable("category", vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(axis.bins(), 4);
        assert_eq!(axis.index(0.5), 0);
        assert_eq!(axis.index(1.0), 1);
        assert_eq!(axis.index(3.0), 3);
        assert_eq!(axis.index(4.0), 4);
        assert_eq!(axis.index(5.0), 5);
    }

    #[test]
    fn invalid_axes_rejected() {
        assert!(BinAxis::regular("x", 0, (0.0, 1.0)).is_err());
        assert!(BinAxis::regular("x", 10, (1.0, 1.0)).is_err());
        assert!(BinAxis::variable("x", vec![1.0]).is_err());
        assert!(BinAxis::variable("x", vec![1.0, 1.0]).is_err());
    }
}
