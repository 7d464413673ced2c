//! Background-source catalog input, updates and the exported bundle.

use serde::Serialize;

use crate::error::{LensError, Result};

/// Raw background catalog handed to `LensSystem::set_background`.
///
/// Angles are lens-centric offsets in arcseconds. Exactly one shear
/// representation must be present: both components `y1` and `y2`, or the
/// tangential shear `yt`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCatalog {
    pub theta1: Vec<f64>,
    pub theta2: Vec<f64>,
    pub zs: Vec<f64>,
    pub y1: Option<Vec<f64>>,
    pub y2: Option<Vec<f64>>,
    pub yt: Option<Vec<f64>>,
    /// Convergence; carried along, not used by the geometry.
    pub k: Option<Vec<f64>>,
    /// Projected density at the source positions; carried along.
    pub rho: Option<Vec<f64>>,
}

impl SourceCatalog {
    pub fn new(theta1: Vec<f64>, theta2: Vec<f64>, zs: Vec<f64>) -> Self {
        Self {
            theta1,
            theta2,
            zs,
            ..Self::default()
        }
    }

    pub fn with_components(mut self, y1: Vec<f64>, y2: Vec<f64>) -> Self {
        self.y1 = Some(y1);
        self.y2 = Some(y2);
        self
    }

    pub fn with_tangential(mut self, yt: Vec<f64>) -> Self {
        self.yt = Some(yt);
        self
    }

    pub fn with_convergence(mut self, k: Vec<f64>) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_density(mut self, rho: Vec<f64>) -> Self {
        self.rho = Some(rho);
        self
    }

    pub fn len(&self) -> usize {
        self.theta1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.theta1.is_empty()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let has_component = self.y1.is_some() || self.y2.is_some();
        if !has_component && self.yt.is_none() {
            return Err(LensError::config(
                "either y1 and y2 must be passed, or yt must be passed; got neither",
            ));
        }
        if has_component && self.yt.is_some() {
            return Err(LensError::config(
                "either y1 and y2 must be passed, or yt must be passed, not both",
            ));
        }
        if has_component && (self.y1.is_none() || self.y2.is_none()) {
            return Err(LensError::config("shear components y1 and y2 must be passed together"));
        }

        let n = self.len();
        if n == 0 {
            return Err(LensError::config("background catalog is empty"));
        }
        let columns = [
            ("theta2", Some(&self.theta2)),
            ("zs", Some(&self.zs)),
            ("y1", self.y1.as_ref()),
            ("y2", self.y2.as_ref()),
            ("yt", self.yt.as_ref()),
            ("k", self.k.as_ref()),
            ("rho", self.rho.as_ref()),
        ];
        for (name, column) in columns {
            check_len(name, column.map(Vec::len), n)?;
        }
        Ok(())
    }
}

pub(crate) fn check_len(name: &str, len: Option<usize>, expected: usize) -> Result<()> {
    match len {
        Some(len) if len != expected => Err(LensError::config(format!(
            "column {name} has {len} entries, expected {expected}"
        ))),
        _ => Ok(()),
    }
}

/// Replacement columns for an existing catalog.
///
/// Applied by `LensSystem::update`, which re-derives the projected radius and
/// tangential shear afterwards. Every supplied column must match the catalog
/// length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUpdate {
    pub theta1: Option<Vec<f64>>,
    pub theta2: Option<Vec<f64>>,
    pub zs: Option<Vec<f64>>,
    pub y1: Option<Vec<f64>>,
    pub y2: Option<Vec<f64>>,
    /// Setting `yt` on a component-mode catalog drops `y1`/`y2` and switches
    /// the catalog to tangential mode.
    pub yt: Option<Vec<f64>>,
}

/// Which shear representation a catalog carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShearMode {
    /// `y1`, `y2` supplied; `yt` derived from them.
    Components,
    /// `yt` supplied directly.
    Tangential,
}

/// Per-source data exported by `LensSystem::background`.
///
/// Columns present depend on the catalog: `y1`/`y2` only in component mode,
/// `k` and `rho` only when supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Background {
    /// Arcseconds.
    pub theta1: Vec<f64>,
    /// Arcseconds.
    pub theta2: Vec<f64>,
    /// Projected halo-centric radius, comoving Mpc/h.
    pub r: Vec<f64>,
    pub zs: Vec<f64>,
    pub yt: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y1: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rho: Option<Vec<f64>>,
}

impl Background {
    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Names of the populated columns, in export order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut out = vec!["theta1", "theta2", "r", "zs", "yt"];
        if self.y1.is_some() {
            out.push("y1");
        }
        if self.y2.is_some() {
            out.push("y2");
        }
        if self.k.is_some() {
            out.push("k");
        }
        if self.rho.is_some() {
            out.push("rho");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SourceCatalog {
        SourceCatalog::new(vec![10.0, 20.0], vec![5.0, -5.0], vec![1.0, 1.2])
    }

    #[test]
    fn both_shear_representations_rejected() {
        let cat = base()
            .with_components(vec![0.1, 0.2], vec![0.0, 0.1])
            .with_tangential(vec![0.1, 0.2]);
        assert!(matches!(cat.validate(), Err(LensError::Configuration(_))));
    }

    #[test]
    fn missing_shear_rejected() {
        assert!(matches!(base().validate(), Err(LensError::Configuration(_))));
    }

    #[test]
    fn lone_component_rejected() {
        let mut cat = base();
        cat.y1 = Some(vec![0.1, 0.2]);
        assert!(cat.validate().is_err());
    }

    #[test]
    fn column_length_mismatch_rejected() {
        let cat = base().with_tangential(vec![0.1]);
        assert!(cat.validate().is_err());
    }
}
