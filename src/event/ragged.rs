//! Per-event variable-length arrays stored as one flat buffer plus offsets.
//!
//! Every per-object quantity in a chunk lives in a [`Ragged`]. Element-wise
//! operations (`map`, `zip_map`, boolean algebra) run over the flat buffer in
//! one pass and keep the event grouping untouched, so selections are written
//! as whole-batch expressions instead of per-event loops. Per-event
//! reductions (`count_true`, `any`, `all`, `sum`, `prod`, `first`) collapse a
//! ragged mask or value array to one entry per event.

use std::sync::Arc;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Ragged<T> {
    // offsets.len() == n_events + 1, offsets[0] == 0, offsets[n] == values.len()
    offsets: Arc<[usize]>,
    values: Vec<T>,
}

impl<T> Ragged<T> {
    /// Build from per-event object counts and the flat values of all events.
    pub fn from_counts(counts: &[usize], values: Vec<T>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &count in counts {
            total += count;
            offsets.push(total);
        }

        if total != values.len() {
            return Err(AnalysisError::Shape(format!(
                "counts sum to {total} but {} values were supplied",
                values.len()
            )));
        }

        Ok(Self {
            offsets: offsets.into(),
            values,
        })
    }

    pub fn from_events(events: Vec<Vec<T>>) -> Self {
        let mut offsets = Vec::with_capacity(events.len() + 1);
        offsets.push(0);
        let mut values = Vec::new();
        for event in events {
            values.extend(event);
            offsets.push(values.len());
        }
        Self {
            offsets: offsets.into(),
            values,
        }
    }

    /// A batch of `n_events` events that all hold zero objects.
    pub fn empty(n_events: usize) -> Self {
        Self {
            offsets: vec![0; n_events + 1].into(),
            values: Vec::new(),
        }
    }

    pub fn offsets(&self) -> &Arc<[usize]> {
        &self.offsets
    }

    pub fn n_events(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of objects across all events.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn event(&self, i: usize) -> &[T] {
        &self.values[self.offsets[i]..self.offsets[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.offsets
            .windows(2)
            .map(|w| &self.values[w[0]..w[1]])
    }

    pub fn same_shape<U>(&self, other: &Ragged<U>) -> bool {
        Arc::ptr_eq(&self.offsets, &other.offsets) || self.offsets == other.offsets
    }

    fn assert_aligned<U>(&self, other: &Ragged<U>) {
        assert!(
            self.same_shape(other),
            "ragged arrays are not aligned ({} vs {} objects)",
            self.len(),
            other.len()
        );
    }

    /// Element-wise transform; the result shares this array's offsets.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Ragged<U> {
        Ragged {
            offsets: Arc::clone(&self.offsets),
            values: self.values.iter().map(f).collect(),
        }
    }

    /// Fallible element-wise transform; stops at the first error.
    pub fn try_map<U, E>(
        &self,
        f: impl FnMut(&T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Ragged<U>, E> {
        let values = self
            .values
            .iter()
            .map(f)
            .collect::<std::result::Result<Vec<U>, E>>()?;
        Ok(Ragged {
            offsets: Arc::clone(&self.offsets),
            values,
        })
    }

    /// Element-wise combination of two aligned arrays.
    ///
    /// # Panics
    /// Panics if the arrays do not have identical per-event counts.
    pub fn zip_map<U, V>(&self, other: &Ragged<U>, mut f: impl FnMut(&T, &U) -> V) -> Ragged<V> {
        self.assert_aligned(other);
        Ragged {
            offsets: Arc::clone(&self.offsets),
            values: self
                .values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }

    /// Combine every object with a per-event scalar of its own event.
    ///
    /// # Panics
    /// Panics if `per_event.len()` differs from the number of events.
    pub fn broadcast<U, V>(&self, per_event: &[U], mut f: impl FnMut(&T, &U) -> V) -> Ragged<V> {
        assert_eq!(
            per_event.len(),
            self.n_events(),
            "per-event array does not match the number of events"
        );
        let mut values = Vec::with_capacity(self.values.len());
        for (event, scalar) in self.iter().zip(per_event) {
            values.extend(event.iter().map(|v| f(v, scalar)));
        }
        Ragged {
            offsets: Arc::clone(&self.offsets),
            values,
        }
    }

    /// Collapse each event to a single value.
    pub fn reduce<U>(&self, f: impl FnMut(&[T]) -> U) -> Vec<U> {
        self.iter().map(f).collect()
    }

    /// Pairwise minimum of `metric` between each object and every object of
    /// `other` in the same event. `None` where `other` has no objects.
    pub fn min_pairwise<U>(
        &self,
        other: &Ragged<U>,
        mut metric: impl FnMut(&T, &U) -> f64,
    ) -> Ragged<Option<f64>> {
        assert_eq!(self.n_events(), other.n_events(), "event counts differ");
        let mut values = Vec::with_capacity(self.values.len());
        for (mine, theirs) in self.iter().zip(other.iter()) {
            for a in mine {
                let min = theirs
                    .iter()
                    .map(|b| metric(a, b))
                    .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))));
                values.push(min);
            }
        }
        Ragged {
            offsets: Arc::clone(&self.offsets),
            values,
        }
    }

    /// True for each object that satisfies `pred` against every object of
    /// `other` in the same event; trivially true when `other` is empty.
    pub fn all_pairwise<U>(
        &self,
        other: &Ragged<U>,
        mut pred: impl FnMut(&T, &U) -> bool,
    ) -> Ragged<bool> {
        assert_eq!(self.n_events(), other.n_events(), "event counts differ");
        let mut values = Vec::with_capacity(self.values.len());
        for (mine, theirs) in self.iter().zip(other.iter()) {
            for a in mine {
                values.push(theirs.iter().all(|b| pred(a, b)));
            }
        }
        Ragged {
            offsets: Arc::clone(&self.offsets),
            values,
        }
    }
}

impl<T: Clone> Ragged<T> {
    /// Keep the objects whose mask entry is true, preserving order.
    ///
    /// # Panics
    /// Panics if the mask is not aligned with this array.
    pub fn select(&self, mask: &Ragged<bool>) -> Ragged<T> {
        self.assert_aligned(mask);
        let mut offsets = Vec::with_capacity(self.offsets.len());
        let mut values = Vec::new();
        offsets.push(0);
        for (event, keep) in self.iter().zip(mask.iter()) {
            values.extend(
                event
                    .iter()
                    .zip(keep)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| v.clone()),
            );
            offsets.push(values.len());
        }
        Ragged {
            offsets: offsets.into(),
            values,
        }
    }

    /// At most the first object of every event.
    pub fn leading(&self) -> Ragged<T> {
        let mut offsets = Vec::with_capacity(self.offsets.len());
        let mut values = Vec::new();
        offsets.push(0);
        for event in self.iter() {
            if let Some(first) = event.first() {
                values.push(first.clone());
            }
            offsets.push(values.len());
        }
        Ragged {
            offsets: offsets.into(),
            values,
        }
    }

    pub fn first(&self) -> Vec<Option<T>> {
        self.iter().map(|event| event.first().cloned()).collect()
    }
}

impl Ragged<bool> {
    pub fn and(&self, other: &Ragged<bool>) -> Ragged<bool> {
        self.zip_map(other, |a, b| *a && *b)
    }

    pub fn or(&self, other: &Ragged<bool>) -> Ragged<bool> {
        self.zip_map(other, |a, b| *a || *b)
    }

    pub fn not(&self) -> Ragged<bool> {
        self.map(|a| !*a)
    }

    pub fn count_true(&self) -> Vec<usize> {
        self.reduce(|event| event.iter().filter(|v| **v).count())
    }

    pub fn any(&self) -> Vec<bool> {
        self.reduce(|event| event.iter().any(|v| *v))
    }

    pub fn all(&self) -> Vec<bool> {
        self.reduce(|event| event.iter().all(|v| *v))
    }
}

impl Ragged<f64> {
    pub fn sum(&self) -> Vec<f64> {
        self.reduce(|event| event.iter().sum())
    }

    /// Per-event product; an empty event has product 1.
    pub fn prod(&self) -> Vec<f64> {
        self.reduce(|event| event.iter().product())
    }
}

impl Ragged<i32> {
    /// Use these values as indices into `target` within the same event.
    /// Negative or out-of-range indices give `None`.
    pub fn gather<U: Copy>(&self, target: &Ragged<U>) -> Result<Ragged<Option<U>>> {
        if self.n_events() != target.n_events() {
            return Err(AnalysisError::Shape(format!(
                "gathering {} events of indices from {} events",
                self.n_events(),
                target.n_events()
            )));
        }
        let mut values = Vec::with_capacity(self.values.len());
        for (indices, pool) in self.iter().zip(target.iter()) {
            values.extend(
                indices
                    .iter()
                    .map(|&i| usize::try_from(i).ok().and_then(|i| pool.get(i).copied())),
            );
        }
        Ok(Ragged {
            offsets: Arc::clone(&self.offsets),
            values,
        })
    }
}
