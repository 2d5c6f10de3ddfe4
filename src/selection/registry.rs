use std::collections::BTreeMap;

use crate::error::{AnalysisError, Result};

/// Named per-event selections, combined by name at fill time.
#[derive(Debug, Clone, Default)]
pub struct SelectionRegistry {
    n_events: usize,
    selections: BTreeMap<String, Vec<bool>>,
}

impl SelectionRegistry {
    pub fn new(n_events: usize) -> Self {
        Self {
            n_events,
            selections: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, name: &str, mask: Vec<bool>) -> Result<()> {
        if mask.len() != self.n_events {
            return Err(AnalysisError::Selection(format!(
                "'{name}' has {} entries for {} events",
                mask.len(),
                self.n_events
            )));
        }
        if self.selections.insert(name.to_string(), mask).is_some() {
            log::warn!("Selection '{}' was registered twice, keeping the newest", name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&[bool]> {
        self.selections
            .get(name)
            .map(|m| m.as_slice())
            .ok_or_else(|| AnalysisError::Selection(format!("no selection named '{name}'")))
    }

    /// Logical AND of the named selections; an empty list selects every event.
    pub fn all(&self, names: &[&str]) -> Result<Vec<bool>> {
        let mut combined = vec![true; self.n_events];
        for name in names {
            let mask = self.get(name)?;
            for (c, m) in combined.iter_mut().zip(mask) {
                *c &= *m;
            }
        }
        Ok(combined)
    }
}
