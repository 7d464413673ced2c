//! Observer-lens-source geometry.
//!
//! `LensSystem` owns one lens redshift and its background catalog. From the
//! raw angular offsets, redshifts and shears it derives:
//!
//! - the projected halo-centric radius of each source (comoving Mpc/h)
//! - the tangential shear (when built from components)
//! - the critical surface density Σc(zs), on demand
//! - ΔΣ = yt · Σc(zs)
//!
//! Derived columns are recomputed by an explicit `refresh` after every
//! mutation (`set_background`, `update`, `set_cosmology`), so they are never
//! stale. Mutations are staged on a copy and only committed once the refresh
//! succeeds.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::cosmology::{C_MPC_PER_GYR, Cosmology, G_MPC3_PER_MSUN_GYR2, MPC2_TO_PC2};
use crate::domain::{Binning, RadialCut};
use crate::error::{LensError, Result};
use crate::lens::catalog::check_len;
use crate::lens::{Background, RadialProfile, ShearMode, SourceCatalog, SourceUpdate};

const ARCSEC_PER_RADIAN: f64 = 180.0 * 3600.0 / PI;

/// Tolerance on `Ω_k` below which a cosmology counts as flat.
const FLAT_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
struct Sources {
    /// Radians.
    theta1: Vec<f64>,
    /// Radians.
    theta2: Vec<f64>,
    zs: Vec<f64>,
    /// `Some` only in component mode.
    components: Option<(Vec<f64>, Vec<f64>)>,
    yt: Vec<f64>,
    k: Option<Vec<f64>>,
    rho: Option<Vec<f64>>,
    r: Vec<f64>,
}

impl Sources {
    fn len(&self) -> usize {
        self.theta1.len()
    }
}

#[derive(Clone)]
pub struct LensSystem {
    zl: f64,
    cosmo: Arc<dyn Cosmology>,
    sources: Option<Sources>,
}

impl fmt::Debug for LensSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensSystem")
            .field("zl", &self.zl)
            .field("cosmo", &self.cosmo)
            .field("n_sources", &self.sources.as_ref().map(Sources::len))
            .finish()
    }
}

fn check_flat(cosmo: &dyn Cosmology) -> Result<()> {
    let ok0 = cosmo.omega_k();
    if ok0.abs() > FLAT_TOLERANCE {
        return Err(LensError::config(format!(
            "lensing geometry assumes a flat cosmology (D_ls = D_s - D_l), got Omega_k = {ok0}"
        )));
    }
    Ok(())
}

impl LensSystem {
    /// Lens at redshift `zl`. Non-flat cosmologies are refused.
    pub fn new(zl: f64, cosmo: Arc<dyn Cosmology>) -> Result<Self> {
        if !(zl.is_finite() && zl >= 0.0) {
            return Err(LensError::config(format!(
                "lens redshift must be finite and >= 0, got {zl}"
            )));
        }
        check_flat(cosmo.as_ref())?;
        Ok(Self {
            zl,
            cosmo,
            sources: None,
        })
    }

    pub fn zl(&self) -> f64 {
        self.zl
    }

    pub fn cosmology(&self) -> &Arc<dyn Cosmology> {
        &self.cosmo
    }

    pub fn has_sources(&self) -> bool {
        self.sources.is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.as_ref().map_or(0, Sources::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shear_mode(&self) -> Option<ShearMode> {
        self.sources.as_ref().map(|s| {
            if s.components.is_some() {
                ShearMode::Components
            } else {
                ShearMode::Tangential
            }
        })
    }

    fn sources(&self) -> Result<&Sources> {
        self.sources
            .as_ref()
            .ok_or_else(|| LensError::state("sources undefined; call set_background() first"))
    }

    /// Install (or wholesale replace) the background catalog.
    pub fn set_background(&mut self, catalog: SourceCatalog) -> Result<()> {
        catalog.validate()?;
        let SourceCatalog {
            theta1,
            theta2,
            zs,
            y1,
            y2,
            yt,
            k,
            rho,
        } = catalog;

        let n = theta1.len();
        let components = y1.zip(y2);
        let mut sources = Sources {
            theta1: theta1.iter().map(|t| t / ARCSEC_PER_RADIAN).collect(),
            theta2: theta2.iter().map(|t| t / ARCSEC_PER_RADIAN).collect(),
            zs,
            yt: yt.unwrap_or_else(|| vec![0.0; n]),
            components,
            k,
            rho,
            r: Vec::new(),
        };
        self.refresh(&mut sources)?;
        self.sources = Some(sources);
        Ok(())
    }

    /// Replace one or more source columns and re-derive r and yt.
    ///
    /// # Errors
    /// - `State` without a catalog
    /// - `Configuration` when `y1`/`y2` are supplied to a tangential-mode
    ///   catalog, when `yt` and components are supplied together, or on a
    ///   column length mismatch
    /// - `Domain` when the new geometry is not finite
    pub fn update(&mut self, update: SourceUpdate) -> Result<()> {
        let mut sources = self.sources()?.clone();
        let n = sources.len();
        for (name, column) in [
            ("theta1", &update.theta1),
            ("theta2", &update.theta2),
            ("zs", &update.zs),
            ("y1", &update.y1),
            ("y2", &update.y2),
            ("yt", &update.yt),
        ] {
            check_len(name, column.as_ref().map(Vec::len), n)?;
        }

        let touches_components = update.y1.is_some() || update.y2.is_some();
        if touches_components && update.yt.is_some() {
            return Err(LensError::config(
                "cannot set yt together with y1/y2 in one update",
            ));
        }

        if let Some(theta1) = update.theta1 {
            sources.theta1 = theta1.iter().map(|t| t / ARCSEC_PER_RADIAN).collect();
        }
        if let Some(theta2) = update.theta2 {
            sources.theta2 = theta2.iter().map(|t| t / ARCSEC_PER_RADIAN).collect();
        }
        if let Some(zs) = update.zs {
            sources.zs = zs;
        }

        if touches_components {
            let Some((y1, y2)) = sources.components.as_mut() else {
                return Err(LensError::config(
                    "catalog was initialized with yt rather than y1, y2; \
                     cannot set shear components",
                ));
            };
            if let Some(new_y1) = update.y1 {
                *y1 = new_y1;
            }
            if let Some(new_y2) = update.y2 {
                *y2 = new_y2;
            }
        }

        if let Some(yt) = update.yt {
            if sources.components.take().is_some() {
                log::warn!(
                    "setting yt on a catalog initialized with y1, y2; \
                     shear components are being cleared"
                );
            }
            sources.yt = yt;
        }

        self.refresh(&mut sources)?;
        self.sources = Some(sources);
        Ok(())
    }

    pub fn set_theta1(&mut self, theta1: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            theta1: Some(theta1),
            ..SourceUpdate::default()
        })
    }

    pub fn set_theta2(&mut self, theta2: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            theta2: Some(theta2),
            ..SourceUpdate::default()
        })
    }

    pub fn set_zs(&mut self, zs: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            zs: Some(zs),
            ..SourceUpdate::default()
        })
    }

    pub fn set_y1(&mut self, y1: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            y1: Some(y1),
            ..SourceUpdate::default()
        })
    }

    pub fn set_y2(&mut self, y2: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            y2: Some(y2),
            ..SourceUpdate::default()
        })
    }

    pub fn set_yt(&mut self, yt: Vec<f64>) -> Result<()> {
        self.update(SourceUpdate {
            yt: Some(yt),
            ..SourceUpdate::default()
        })
    }

    /// Set or clear the convergence column. Nothing derived depends on it.
    pub fn set_convergence(&mut self, k: Option<Vec<f64>>) -> Result<()> {
        let n = self.len();
        let sources = self
            .sources
            .as_mut()
            .ok_or_else(|| LensError::state("sources undefined; call set_background() first"))?;
        check_len("k", k.as_ref().map(Vec::len), n)?;
        sources.k = k;
        Ok(())
    }

    /// Swap the cosmology and re-derive the geometry.
    pub fn set_cosmology(&mut self, cosmo: Arc<dyn Cosmology>) -> Result<()> {
        check_flat(cosmo.as_ref())?;
        let previous = std::mem::replace(&mut self.cosmo, cosmo);
        if let Some(mut sources) = self.sources.clone() {
            if let Err(e) = self.refresh(&mut sources) {
                self.cosmo = previous;
                return Err(e);
            }
            self.sources = Some(sources);
        }
        Ok(())
    }

    /// Recompute every derived column of `sources`.
    fn refresh(&self, sources: &mut Sources) -> Result<()> {
        // The distance factor does not depend on the sources; it is still
        // recomputed so a cosmology swap is always picked up.
        let scale = self.cosmo.comoving_distance(self.zl) * self.cosmo.h();
        let r: Vec<f64> = sources
            .theta1
            .iter()
            .zip(sources.theta2.iter())
            .map(|(t1, t2)| t1.tan().hypot(t2.tan()) * scale)
            .collect();
        if let Some(i) = r.iter().position(|v| !v.is_finite()) {
            return Err(LensError::domain(format!(
                "projected radius of source {i} is not finite (theta1={}, theta2={} rad)",
                sources.theta1[i], sources.theta2[i]
            )));
        }
        sources.r = r;

        // Shear magnitude, not the signed tangential projection.
        if let Some((y1, y2)) = &sources.components {
            sources.yt = y1.iter().zip(y2.iter()).map(|(a, b)| a.hypot(*b)).collect();
        }
        Ok(())
    }

    /// Per-source data, with angles converted back to arcseconds.
    pub fn background(&self) -> Result<Background> {
        let s = self.sources()?;
        let (y1, y2) = match &s.components {
            Some((y1, y2)) => (Some(y1.clone()), Some(y2.clone())),
            None => (None, None),
        };
        Ok(Background {
            theta1: s.theta1.iter().map(|t| t * ARCSEC_PER_RADIAN).collect(),
            theta2: s.theta2.iter().map(|t| t * ARCSEC_PER_RADIAN).collect(),
            r: s.r.clone(),
            zs: s.zs.clone(),
            yt: s.yt.clone(),
            y1,
            y2,
            k: s.k.clone(),
            rho: s.rho.clone(),
        })
    }

    /// Projected radii, comoving Mpc/h.
    pub fn r(&self) -> Result<&[f64]> {
        Ok(&self.sources()?.r)
    }

    pub fn yt(&self) -> Result<&[f64]> {
        Ok(&self.sources()?.yt)
    }

    pub fn zs(&self) -> Result<&[f64]> {
        Ok(&self.sources()?.zs)
    }

    /// Σc for a single source redshift, comoving `(M_sun/h) / (pc/h)^2`.
    ///
    /// Uses `D_ls = D_s - D_l` on angular-diameter distances, which is only
    /// meaningful for a flat cosmology (enforced at construction). At
    /// `zs == zl` the result is infinite; below `zl` it is negative.
    pub fn critical_surface_density_at(&self, zs: f64) -> f64 {
        let a = 1.0 / (1.0 + self.zl);
        let ds = self.cosmo.angular_diameter_distance(zs);
        let dl = self.cosmo.angular_diameter_distance(self.zl);
        self.sigma_crit_with(ds, dl, a)
    }

    fn sigma_crit_with(&self, ds: f64, dl: f64, a: f64) -> f64 {
        let dls = ds - dl;
        let prefactor = C_MPC_PER_GYR * C_MPC_PER_GYR / (4.0 * PI * G_MPC3_PER_MSUN_GYR2);
        let sigma_proper = prefactor * ds / (dl * dls);
        sigma_proper * a * a / (MPC2_TO_PC2 * self.cosmo.h())
    }

    /// Σc at each of `zs`, or at the catalog redshifts when `zs` is `None`.
    pub fn critical_surface_density(&self, zs: Option<&[f64]>) -> Result<Vec<f64>> {
        let zs = match zs {
            Some(zs) => zs,
            None => &self.sources()?.zs,
        };
        let a = 1.0 / (1.0 + self.zl);
        let dl = self.cosmo.angular_diameter_distance(self.zl);
        Ok(zs
            .iter()
            .map(|&z| self.sigma_crit_with(self.cosmo.angular_diameter_distance(z), dl, a))
            .collect())
    }

    /// ΔΣ = yt · Σc(zs) for every source.
    ///
    /// Foreground sources (`zs < zl`) get a finite, negative Σc and are kept.
    ///
    /// # Errors
    /// `Domain` when a ΔΣ value is not finite, e.g. a source at `zs == zl`.
    pub fn delta_sigma(&self) -> Result<Vec<f64>> {
        let s = self.sources()?;
        let sigma_crit = self.critical_surface_density(None)?;
        let ds: Vec<f64> = s.yt.iter().zip(sigma_crit).map(|(yt, sc)| yt * sc).collect();
        if let Some(i) = ds.iter().position(|v| !v.is_finite()) {
            return Err(LensError::domain(format!(
                "ΔΣ of source {i} is not finite (zs={}, zl={})",
                s.zs[i], self.zl
            )));
        }
        Ok(ds)
    }

    /// Projected density implied by the convergence, `k · Σc(zs)`.
    pub fn convergence_density(&self) -> Result<Vec<f64>> {
        let s = self.sources()?;
        let k = s
            .k
            .as_ref()
            .ok_or_else(|| LensError::state("convergence k was not supplied with the catalog"))?;
        let sigma_crit = self.critical_surface_density(None)?;
        Ok(k.iter().zip(sigma_crit).map(|(k, sc)| k * sc).collect())
    }

    /// (r, ΔΣ) pairs inside a radial cut.
    pub fn radial_profile(&self, cut: &RadialCut) -> Result<RadialProfile> {
        let r = self.r()?.to_vec();
        RadialProfile::new(r, self.delta_sigma()?)?.cut(cut)
    }

    /// Per-bin mean radius and ΔΣ inside a radial cut.
    pub fn delta_sigma_binned(&self, binning: &Binning, cut: &RadialCut) -> Result<RadialProfile> {
        self.radial_profile(cut)?.binned(binning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmology::FlatLambdaCdm;
    use approx::assert_relative_eq;

    #[derive(Debug)]
    struct Curved;

    impl Cosmology for Curved {
        fn h(&self) -> f64 {
            0.7
        }
        fn efunc(&self, _z: f64) -> f64 {
            1.0
        }
        fn comoving_distance(&self, z: f64) -> f64 {
            4283.0 * z
        }
        fn omega_k(&self) -> f64 {
            0.05
        }
    }

    fn lens() -> LensSystem {
        LensSystem::new(0.3, Arc::new(FlatLambdaCdm::wmap7())).unwrap()
    }

    fn component_catalog() -> SourceCatalog {
        SourceCatalog::new(vec![30.0, -60.0, 120.0], vec![40.0, 10.0, -90.0], vec![0.8, 1.1, 1.5])
            .with_components(vec![0.03, -0.01, 0.02], vec![0.04, 0.02, 0.0])
    }

    #[test]
    fn background_requires_catalog() {
        let lens = lens();
        assert!(!lens.has_sources());
        assert!(matches!(lens.background(), Err(LensError::State(_))));
        assert!(matches!(lens.critical_surface_density(None), Err(LensError::State(_))));
        assert!(lens.critical_surface_density(Some(&[1.0])).is_ok());
    }

    #[test]
    fn angles_round_trip_through_background() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        let bg = lens.background().unwrap();
        assert_relative_eq!(bg.theta1[1], -60.0, max_relative = 1e-12);
        assert_relative_eq!(bg.theta2[2], -90.0, max_relative = 1e-12);
        assert_eq!(bg.columns(), vec!["theta1", "theta2", "r", "zs", "yt", "y1", "y2"]);
        // Shear magnitude: |(0.03, 0.04)| = 0.05.
        assert_relative_eq!(bg.yt[0], 0.05, max_relative = 1e-12);
    }

    #[test]
    fn background_is_idempotent() {
        let mut lens = lens();
        lens.set_background(component_catalog().with_convergence(vec![0.1, 0.2, 0.3]))
            .unwrap();
        assert_eq!(lens.background().unwrap(), lens.background().unwrap());
    }

    #[test]
    fn projected_radius_uses_comoving_distance_to_lens() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        let cosmo = FlatLambdaCdm::wmap7();
        let t1 = 30.0 / ARCSEC_PER_RADIAN;
        let t2 = 40.0 / ARCSEC_PER_RADIAN;
        let expected = t1.tan().hypot(t2.tan()) * cosmo.comoving_distance(0.3) * cosmo.h();
        assert_relative_eq!(lens.r().unwrap()[0], expected, max_relative = 1e-12);
    }

    #[test]
    fn setting_yt_switches_mode_and_locks_components() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        assert_eq!(lens.shear_mode(), Some(ShearMode::Components));

        lens.set_yt(vec![0.1, 0.2, 0.3]).unwrap();
        assert_eq!(lens.shear_mode(), Some(ShearMode::Tangential));
        let bg = lens.background().unwrap();
        assert!(bg.y1.is_none() && bg.y2.is_none());
        assert_eq!(bg.yt, vec![0.1, 0.2, 0.3]);

        assert!(matches!(lens.set_y1(vec![0.0; 3]), Err(LensError::Configuration(_))));
        assert!(matches!(lens.set_y2(vec![0.0; 3]), Err(LensError::Configuration(_))));
    }

    #[test]
    fn component_update_rederives_tangential_shear() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        lens.set_y2(vec![0.0, 0.0, 0.0]).unwrap();
        let yt = lens.yt().unwrap();
        assert_relative_eq!(yt[0], 0.03, max_relative = 1e-12);
        assert_relative_eq!(yt[1], 0.01, max_relative = 1e-12);
    }

    #[test]
    fn theta_update_rederives_radius() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        let before = lens.r().unwrap()[0];
        lens.set_theta1(vec![60.0, -60.0, 120.0]).unwrap();
        assert!(lens.r().unwrap()[0] > before);
    }

    #[test]
    fn failed_update_leaves_catalog_untouched() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        let before = lens.background().unwrap();
        assert!(lens.set_theta1(vec![1.0]).is_err());
        assert!(lens.set_theta1(vec![f64::NAN, 0.0, 0.0]).is_err());
        assert_eq!(lens.background().unwrap(), before);
    }

    #[test]
    fn critical_density_grows_as_source_approaches_lens() {
        let lens = lens();
        let zs = [1.0, 0.8, 0.6, 0.5, 0.4, 0.35, 0.32, 0.31, 0.301];
        let sc = lens.critical_surface_density(Some(&zs)).unwrap();
        for w in sc.windows(2) {
            assert!(w[1] > w[0], "Σc must increase toward the lens: {} -> {}", w[0], w[1]);
        }
        assert!(lens.critical_surface_density_at(0.3).is_infinite());
    }

    #[test]
    fn critical_density_has_cluster_lensing_magnitude() {
        // Σc for zl=0.3, zs=1 is a few thousand M_sun/pc^2 (proper); comoving
        // h-units land within a factor of a few of that.
        let sc = lens().critical_surface_density_at(1.0);
        assert!(sc > 300.0 && sc < 5000.0, "Σc = {sc}");
    }

    #[test]
    fn foreground_sources_give_negative_delta_sigma() {
        let mut lens = lens();
        lens.set_background(
            SourceCatalog::new(vec![30.0], vec![10.0], vec![0.2]).with_tangential(vec![0.01]),
        )
        .unwrap();
        let ds = lens.delta_sigma().unwrap();
        assert!(ds[0].is_finite() && ds[0] < 0.0);
    }

    #[test]
    fn source_at_lens_redshift_is_a_domain_error() {
        let mut lens = lens();
        let zl = lens.zl();
        lens.set_background(
            SourceCatalog::new(vec![30.0], vec![10.0], vec![zl]).with_tangential(vec![0.01]),
        )
        .unwrap();
        assert!(matches!(lens.delta_sigma(), Err(LensError::Domain(_))));
    }

    #[test]
    fn convergence_density_scales_by_sigma_crit() {
        let mut lens = lens();
        lens.set_background(component_catalog().with_convergence(vec![0.1, 0.2, 0.3]))
            .unwrap();
        let rho = lens.convergence_density().unwrap();
        let sc = lens.critical_surface_density(None).unwrap();
        assert_relative_eq!(rho[2], 0.3 * sc[2], max_relative = 1e-12);
        lens.set_convergence(None).unwrap();
        assert!(matches!(lens.convergence_density(), Err(LensError::State(_))));
    }

    #[test]
    fn curved_cosmology_is_refused() {
        assert!(LensSystem::new(0.3, Arc::new(Curved)).is_err());
        let mut lens = lens();
        assert!(lens.set_cosmology(Arc::new(Curved)).is_err());
    }

    #[test]
    fn density_column_is_exported_when_supplied() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        assert!(!lens.background().unwrap().columns().contains(&"rho"));

        lens.set_background(component_catalog().with_density(vec![1.0, 2.0, 3.0]))
            .unwrap();
        let bg = lens.background().unwrap();
        assert_eq!(
            bg.columns(),
            vec!["theta1", "theta2", "r", "zs", "yt", "y1", "y2", "rho"]
        );
        assert_eq!(bg.rho, Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn binned_delta_sigma_matches_binned_radial_profile() {
        let mut lens = lens();
        lens.set_background(component_catalog()).unwrap();
        let cut = RadialCut::new(0.0, None);
        let binning = Binning::Edges(vec![0.0, 0.3, 2.0]);
        let binned = lens.delta_sigma_binned(&binning, &cut).unwrap();
        let expected = lens.radial_profile(&cut).unwrap().binned(&binning).unwrap();
        assert_eq!(binned, expected);
        assert!(!binned.is_empty());
    }
}
