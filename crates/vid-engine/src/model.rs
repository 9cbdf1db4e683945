//! The memoized VID model.
//!
//! Every derived quantity is a [`Memo`] slot whose stamp lists the generations
//! of the configuration groups it reads plus the revisions of the upstream
//! stages it consumes. Getters bring upstream stages up to date first, so a
//! changed input invalidates exactly its transitive dependents.

use num_complex::Complex64;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use vid_core::{BinnedVid, DensityCurve, IntensityUnit, Result};
use vid_models::ModelRegistry;

use crate::cache::{Clock, Memo};
use crate::channel::{Channel, ChannelKind};
use crate::config::{ClusteringConfig, VidConfig};
use crate::conversion::Conversion;
use crate::frequency_grid::FrequencyGrid;
use crate::histogram::{bin_edges, integrate_bins};
use crate::inverse::{gaussian_density, InverseTransform};
use crate::population::{MassTable, Population};
use crate::quadrature::GaussLegendre;
use crate::signal::{SignalAggregator, SignalTerms};
use crate::single_source::ReferenceTransform;
use crate::smoothing::SmoothingTable;
use crate::variance::density_variance;

/// Memoized stages, for [`VidModel::compute_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Forward-transform quadrature rule.
    FtQuadrature,
    /// Inverse-transform quadrature rule.
    IftQuadrature,
    /// Piecewise frequency grid.
    FrequencyGrid,
    /// NUFFT plan of the inverse transform.
    InversePlan,
    /// Redshift, geometry and intensity conversion.
    Conversion,
    /// Per-mass population table.
    MassTable,
    /// Reference single-source transform.
    ReferenceTransform,
    /// Voxel smoothing profiles.
    Smoothing,
    /// Voxel-scale density variance.
    DensityVariance,
    /// Mean voxel intensity.
    MeanIntensity,
    /// Signal cumulant on the frequency grid.
    SignalCumulant,
    /// Signal + stabilization characteristic function.
    ControlCf,
    /// Signal + noise characteristic function.
    FullCf,
    /// Signal-only density.
    PtS,
    /// Signal + noise density.
    Pt,
    /// Noise-only density.
    PtN,
    /// Histogram edges.
    BinEdges,
    /// Binned signal-only density.
    BiS,
    /// Binned signal + noise density.
    Bi,
    /// Binned noise-only density.
    BiN,
}

#[derive(Debug, Default, Clone, Copy)]
struct Generations {
    grid: u64,
    nufft: u64,
    histogram: u64,
    quad_ft: u64,
    quad_ift: u64,
    scatter: u64,
    survey: u64,
    cosmology: u64,
    population: u64,
    smoothing: u64,
    clustering: u64,
    noise: u64,
    control: u64,
}

/// Modification times of the quadrature tables the cached rules were read from.
#[derive(Debug, Default, Clone, Copy)]
struct TableTimes {
    ft: Option<SystemTime>,
    ift: Option<SystemTime>,
}

#[derive(Default)]
struct Slots {
    ft_rule: Memo<GaussLegendre>,
    ift_rule: Memo<GaussLegendre>,
    grid: Memo<FrequencyGrid>,
    plan: Memo<InverseTransform>,
    conversion: Memo<Conversion>,
    mass_table: Memo<MassTable>,
    reference: Memo<ReferenceTransform>,
    smoothing: Memo<SmoothingTable>,
    variance: Memo<f64>,
    mean: Memo<f64>,
    signal: Memo<Vec<Complex64>>,
    control_cf: Memo<Vec<Complex64>>,
    full_cf: Memo<Vec<Complex64>>,
    pt_s: Memo<DensityCurve>,
    pt: Memo<DensityCurve>,
    pt_n: Memo<DensityCurve>,
    edges: Memo<Vec<f64>>,
    bi_s: Memo<BinnedVid>,
    bi: Memo<BinnedVid>,
    bi_n: Memo<BinnedVid>,
}

/// Everything `limvid run` reports.
#[derive(Debug, Clone, Serialize)]
pub struct VidReport {
    /// Intensity unit of every curve.
    pub unit: IntensityUnit,
    /// Line redshift.
    pub redshift: f64,
    /// Mean voxel intensity.
    pub mean_intensity: f64,
    /// Expected sources per voxel.
    pub mean_occupancy: f64,
    /// Density variance used by the clustering term.
    pub density_variance: f64,
    /// Signal + noise density.
    pub pt: DensityCurve,
    /// Signal-only (stabilized) density.
    pub pt_s: DensityCurve,
    /// Noise-only density, when noise is configured.
    pub pt_n: Option<DensityCurve>,
    /// Binned signal + noise.
    pub bi: BinnedVid,
    /// Binned signal only.
    pub bi_s: BinnedVid,
    /// Binned noise only.
    pub bi_n: Option<BinnedVid>,
}

/// Configuration, collaborators and memoized stages of one VID computation.
pub struct VidModel {
    config: VidConfig,
    registry: Arc<ModelRegistry>,
    population: Population,
    gens: Generations,
    table_times: TableTimes,
    clock: Clock,
    slots: Slots,
}

impl std::fmt::Debug for VidModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VidModel").field("config", &self.config).field("population", &self.population).finish()
    }
}

fn bump(changed: bool, gen: &mut u64, clock: &mut Clock) {
    if changed {
        *gen = clock.tick();
    }
}

impl VidModel {
    /// Model with the built-in registry.
    pub fn new(config: VidConfig) -> Result<Self> {
        Self::with_registry(config, Arc::new(ModelRegistry::with_builtins()))
    }

    /// Model resolving population models from `registry`.
    pub fn with_registry(config: VidConfig, registry: Arc<ModelRegistry>) -> Result<Self> {
        let config = config.validated()?;
        let population = Population::resolve(&registry, &config.population)?;
        Ok(Self {
            config,
            registry,
            population,
            gens: Generations::default(),
            table_times: TableTimes::default(),
            clock: Clock::default(),
            slots: Slots::default(),
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &VidConfig {
        &self.config
    }

    /// Resolved population models.
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Replace the configuration. Only the groups that differ are invalidated;
    /// nothing is recomputed until it is read. On error the model is unchanged.
    pub fn update(&mut self, config: VidConfig) -> Result<()> {
        let config = config.validated()?;
        let population = if config.population != self.config.population {
            Some(Population::resolve(&self.registry, &config.population)?)
        } else {
            None
        };

        let (old, new) = (&self.config, &config);
        let (ot, nt) = (&old.transform, &new.transform);
        let g = &mut self.gens;
        let c = &mut self.clock;
        bump(
            ot.t_max != nt.t_max || ot.n_t != nt.n_t || ot.f_min != nt.f_min || ot.f_max != nt.f_max,
            &mut g.grid,
            c,
        );
        bump(ot.nufft_tolerance != nt.nufft_tolerance || ot.cf_floor != nt.cf_floor, &mut g.nufft, c);
        bump(old.histogram != new.histogram, &mut g.histogram, c);
        bump(
            old.quadrature.ft != new.quadrature.ft || old.quadrature.ft_panels != new.quadrature.ft_panels,
            &mut g.quad_ft,
            c,
        );
        bump(old.quadrature.ift != new.quadrature.ift, &mut g.quad_ift, c);
        bump(old.scatter != new.scatter, &mut g.scatter, c);
        bump(old.survey != new.survey, &mut g.survey, c);
        bump(old.cosmology != new.cosmology, &mut g.cosmology, c);
        bump(old.population != new.population, &mut g.population, c);
        bump(old.smoothing != new.smoothing, &mut g.smoothing, c);
        bump(old.clustering != new.clustering, &mut g.clustering, c);
        bump(old.noise != new.noise, &mut g.noise, c);
        bump(old.control != new.control, &mut g.control, c);

        if let Some(p) = population {
            self.population = p;
        }
        self.config = config;
        Ok(())
    }

    /// How many times `stage` has been computed.
    pub fn compute_count(&self, stage: Stage) -> u64 {
        let s = &self.slots;
        match stage {
            Stage::FtQuadrature => s.ft_rule.computations(),
            Stage::IftQuadrature => s.ift_rule.computations(),
            Stage::FrequencyGrid => s.grid.computations(),
            Stage::InversePlan => s.plan.computations(),
            Stage::Conversion => s.conversion.computations(),
            Stage::MassTable => s.mass_table.computations(),
            Stage::ReferenceTransform => s.reference.computations(),
            Stage::Smoothing => s.smoothing.computations(),
            Stage::DensityVariance => s.variance.computations(),
            Stage::MeanIntensity => s.mean.computations(),
            Stage::SignalCumulant => s.signal.computations(),
            Stage::ControlCf => s.control_cf.computations(),
            Stage::FullCf => s.full_cf.computations(),
            Stage::PtS => s.pt_s.computations(),
            Stage::Pt => s.pt.computations(),
            Stage::PtN => s.pt_n.computations(),
            Stage::BinEdges => s.edges.computations(),
            Stage::BiS => s.bi_s.computations(),
            Stage::Bi => s.bi.computations(),
            Stage::BiN => s.bi_n.computations(),
        }
    }

    // ---------------------------------------------------------------------
    // Stage resolution
    // ---------------------------------------------------------------------

    // A table rewritten in place keeps its path, so its mtime joins the
    // generation check.
    fn ft_rule_rev(&mut self) -> Result<(Arc<GaussLegendre>, u64)> {
        let src = &self.config.quadrature.ft;
        let modified = src.modified();
        if modified != self.table_times.ft {
            if self.table_times.ft.is_some() {
                log::debug!("ft quadrature table changed on disk");
            }
            self.table_times.ft = modified;
            self.gens.quad_ft = self.clock.tick();
        }
        self.slots.ft_rule.resolve(vec![self.gens.quad_ft], &mut self.clock, || src.load())
    }

    fn ift_rule_rev(&mut self) -> Result<(Arc<GaussLegendre>, u64)> {
        let src = &self.config.quadrature.ift;
        let modified = src.modified();
        if modified != self.table_times.ift {
            if self.table_times.ift.is_some() {
                log::debug!("ift quadrature table changed on disk");
            }
            self.table_times.ift = modified;
            self.gens.quad_ift = self.clock.tick();
        }
        self.slots.ift_rule.resolve(vec![self.gens.quad_ift], &mut self.clock, || src.load())
    }

    fn grid_rev(&mut self) -> Result<(Arc<FrequencyGrid>, u64)> {
        let (rule, rule_rev) = self.ift_rule_rev()?;
        let t = &self.config.transform;
        self.slots.grid.resolve(vec![self.gens.grid, rule_rev], &mut self.clock, || {
            FrequencyGrid::build(t.t_max, t.n_t, t.f_min, t.f_max, &rule)
        })
    }

    fn plan_rev(&mut self) -> Result<(Arc<InverseTransform>, u64)> {
        let t = &self.config.transform;
        self.slots.plan.resolve(vec![self.gens.grid, self.gens.nufft], &mut self.clock, || {
            InverseTransform::new(t.n_t, 2.0 * t.t_max / t.n_t as f64, t.nufft_tolerance, t.cf_floor)
        })
    }

    fn conversion_rev(&mut self) -> Result<(Arc<Conversion>, u64)> {
        let (survey, cosmology) = (&self.config.survey, &self.config.cosmology);
        self.slots.conversion.resolve(vec![self.gens.survey, self.gens.cosmology], &mut self.clock, || {
            Conversion::new(survey, cosmology)
        })
    }

    fn mass_table_rev(&mut self) -> Result<(Arc<MassTable>, u64)> {
        let (conv, conv_rev) = self.conversion_rev()?;
        let (cfg, population) = (&self.config.population, &self.population);
        self.slots.mass_table.resolve(vec![self.gens.population, conv_rev], &mut self.clock, || {
            MassTable::build(cfg, population, &conv)
        })
    }

    fn reference_rev(&mut self) -> Result<(Arc<ReferenceTransform>, u64)> {
        let (rule, rule_rev) = self.ft_rule_rev()?;
        let (scatter, panels) = (&self.config.scatter, self.config.quadrature.ft_panels);
        self.slots.reference.resolve(vec![self.gens.scatter, rule_rev], &mut self.clock, || {
            ReferenceTransform::build(scatter, &rule, panels)
        })
    }

    fn smoothing_rev(&mut self) -> Result<(Arc<SmoothingTable>, u64)> {
        let (conv, conv_rev) = self.conversion_rev()?;
        let table = if self.config.smoothing.line_width.is_some() { Some(self.mass_table_rev()?) } else { None };
        let table_rev = table.as_ref().map_or(0, |(_, r)| *r);
        let cfg = &self.config.smoothing;
        self.slots.smoothing.resolve(vec![self.gens.smoothing, conv_rev, table_rev], &mut self.clock, || {
            let masses = table.as_ref().map_or(&[][..], |(t, _)| t.masses.as_slice());
            SmoothingTable::build(cfg, &conv, masses)
        })
    }

    fn variance_rev(&mut self) -> Result<(Arc<f64>, u64)> {
        let (conv, conv_rev) = self.conversion_rev()?;
        let (table, table_rev) = self.mass_table_rev()?;
        let needs_table = matches!(self.config.clustering, ClusteringConfig::PowerSpectrum { rsd: Some(_), .. });
        let cfg = &self.config.clustering;
        let stamp = vec![self.gens.clustering, conv_rev, if needs_table { table_rev } else { 0 }];
        self.slots.variance.resolve(stamp, &mut self.clock, || density_variance(cfg, &conv, &table))
    }

    fn mean_rev(&mut self) -> Result<(Arc<f64>, u64)> {
        let (conv, conv_rev) = self.conversion_rev()?;
        let (table, table_rev) = self.mass_table_rev()?;
        self.slots.mean.resolve(vec![conv_rev, table_rev], &mut self.clock, || {
            Ok(table.mean_intensity(conv.geometry.volume))
        })
    }

    fn signal_rev(&mut self) -> Result<(Arc<Vec<Complex64>>, u64)> {
        let (grid, grid_rev) = self.grid_rev()?;
        let (conv, conv_rev) = self.conversion_rev()?;
        let (table, table_rev) = self.mass_table_rev()?;
        let (smoothing, smoothing_rev) = self.smoothing_rev()?;
        let (reference, reference_rev) = self.reference_rev()?;
        let (variance, variance_rev) = self.variance_rev()?;
        let stamp = vec![grid_rev, conv_rev, table_rev, smoothing_rev, reference_rev, variance_rev];
        self.slots.signal.resolve(stamp, &mut self.clock, || {
            log::debug!("signal cumulant: {} masses x {} frequencies", table.len(), grid.points.len());
            SignalAggregator::new(&table, &smoothing, &reference, conv.geometry.volume, *variance)
                .cumulants(&grid.points)
        })
    }

    fn channel(&mut self, full: bool) -> Result<(Channel, u64)> {
        let (mean, mean_rev) = self.mean_rev()?;
        let kind = if full {
            ChannelKind::Full { sigma: self.config.noise.effective_sigma() }
        } else {
            ChannelKind::Control { sigma: self.config.control.sigma_stable }
        };
        let mean_shift = if self.config.control.subtract_mean { Some(*mean) } else { None };
        Ok((Channel { kind, mean_shift }, mean_rev))
    }

    fn control_cf_rev(&mut self) -> Result<(Arc<Vec<Complex64>>, u64)> {
        let (signal, signal_rev) = self.signal_rev()?;
        let (grid, grid_rev) = self.grid_rev()?;
        let (channel, mean_rev) = self.channel(false)?;
        let stamp = vec![signal_rev, grid_rev, mean_rev, self.gens.control];
        self.slots.control_cf.resolve(stamp, &mut self.clock, || Ok(channel.apply(&grid.points, &signal)))
    }

    fn full_cf_rev(&mut self) -> Result<(Arc<Vec<Complex64>>, u64)> {
        let (signal, signal_rev) = self.signal_rev()?;
        let (grid, grid_rev) = self.grid_rev()?;
        let (channel, mean_rev) = self.channel(true)?;
        let stamp = vec![signal_rev, grid_rev, mean_rev, self.gens.control, self.gens.noise];
        self.slots.full_cf.resolve(stamp, &mut self.clock, || Ok(channel.apply(&grid.points, &signal)))
    }

    fn pt_s_rev(&mut self) -> Result<(Arc<DensityCurve>, u64)> {
        let (cf, cf_rev) = self.control_cf_rev()?;
        let (grid, grid_rev) = self.grid_rev()?;
        let (plan, plan_rev) = self.plan_rev()?;
        let unit = self.config.survey.unit;
        let stamp = vec![cf_rev, grid_rev, plan_rev, self.gens.survey];
        self.slots.pt_s.resolve(stamp, &mut self.clock, || plan.invert(&grid, &cf, unit))
    }

    fn pt_rev(&mut self) -> Result<(Arc<DensityCurve>, u64)> {
        let (cf, cf_rev) = self.full_cf_rev()?;
        let (grid, grid_rev) = self.grid_rev()?;
        let (plan, plan_rev) = self.plan_rev()?;
        let unit = self.config.survey.unit;
        let stamp = vec![cf_rev, grid_rev, plan_rev, self.gens.survey];
        self.slots.pt.resolve(stamp, &mut self.clock, || plan.invert(&grid, &cf, unit))
    }

    fn pt_n_rev(&mut self) -> Result<(Arc<DensityCurve>, u64)> {
        let (plan, plan_rev) = self.plan_rev()?;
        let (sigma, unit) = (self.config.noise.effective_sigma(), self.config.survey.unit);
        let stamp = vec![plan_rev, self.gens.noise, self.gens.survey];
        self.slots.pt_n.resolve(stamp, &mut self.clock, || gaussian_density(plan.grid(), sigma, unit))
    }

    fn edges_rev(&mut self) -> Result<(Arc<Vec<f64>>, u64)> {
        let (h, t_max) = (&self.config.histogram, self.config.transform.t_max);
        self.slots.edges.resolve(vec![self.gens.histogram, self.gens.grid], &mut self.clock, || {
            bin_edges(h.t_min, t_max, h.n_bins, h.binning)
        })
    }

    fn bi_s_rev(&mut self) -> Result<(Arc<BinnedVid>, u64)> {
        let (pt, pt_rev) = self.pt_s_rev()?;
        let (edges, edges_rev) = self.edges_rev()?;
        self.slots.bi_s.resolve(vec![pt_rev, edges_rev], &mut self.clock, || integrate_bins(&pt, &edges))
    }

    fn bi_rev(&mut self) -> Result<(Arc<BinnedVid>, u64)> {
        let (pt, pt_rev) = self.pt_rev()?;
        let (edges, edges_rev) = self.edges_rev()?;
        self.slots.bi.resolve(vec![pt_rev, edges_rev], &mut self.clock, || integrate_bins(&pt, &edges))
    }

    fn bi_n_rev(&mut self) -> Result<(Arc<BinnedVid>, u64)> {
        let (pt, pt_rev) = self.pt_n_rev()?;
        let (edges, edges_rev) = self.edges_rev()?;
        self.slots.bi_n.resolve(vec![pt_rev, edges_rev], &mut self.clock, || integrate_bins(&pt, &edges))
    }

    // ---------------------------------------------------------------------
    // Public accessors
    // ---------------------------------------------------------------------

    /// Piecewise frequency grid.
    pub fn frequency_grid(&mut self) -> Result<Arc<FrequencyGrid>> {
        Ok(self.grid_rev()?.0)
    }

    /// Redshift, voxel geometry and intensity conversion.
    pub fn conversion(&mut self) -> Result<Arc<Conversion>> {
        Ok(self.conversion_rev()?.0)
    }

    /// Population on the mass grid.
    pub fn mass_table(&mut self) -> Result<Arc<MassTable>> {
        Ok(self.mass_table_rev()?.0)
    }

    /// Reference single-source transform.
    pub fn reference_transform(&mut self) -> Result<Arc<ReferenceTransform>> {
        Ok(self.reference_rev()?.0)
    }

    /// Smoothing profiles.
    pub fn smoothing(&mut self) -> Result<Arc<SmoothingTable>> {
        Ok(self.smoothing_rev()?.0)
    }

    /// Density variance of the clustering term.
    pub fn density_variance(&mut self) -> Result<f64> {
        Ok(*self.variance_rev()?.0)
    }

    /// Mean voxel intensity.
    pub fn mean_intensity(&mut self) -> Result<f64> {
        Ok(*self.mean_rev()?.0)
    }

    /// Expected sources per voxel (before smoothing).
    pub fn mean_occupancy(&mut self) -> Result<f64> {
        let conv = self.conversion()?;
        Ok(self.mass_table()?.mean_occupancy(conv.geometry.volume))
    }

    /// Signal cumulant on the frequency grid.
    pub fn signal_cumulant(&mut self) -> Result<Arc<Vec<Complex64>>> {
        Ok(self.signal_rev()?.0)
    }

    /// Shot and clustering terms at an arbitrary frequency `f >= 0`.
    pub fn signal_terms_at(&mut self, f: f64) -> Result<SignalTerms> {
        let conv = self.conversion()?;
        let table = self.mass_table()?;
        let smoothing = self.smoothing()?;
        let reference = self.reference_transform()?;
        let variance = self.density_variance()?;
        SignalAggregator::new(&table, &smoothing, &reference, conv.geometry.volume, variance).terms(f)
    }

    /// Signal + stabilization characteristic function on the grid.
    pub fn control_cf(&mut self) -> Result<Arc<Vec<Complex64>>> {
        Ok(self.control_cf_rev()?.0)
    }

    /// Signal + noise characteristic function on the grid.
    pub fn full_cf(&mut self) -> Result<Arc<Vec<Complex64>>> {
        Ok(self.full_cf_rev()?.0)
    }

    /// Signal + noise characteristic function at `f >= 0`.
    pub fn full_cf_at(&mut self, f: f64) -> Result<Complex64> {
        let signal = self.signal_terms_at(f)?.total();
        Ok(self.channel(true)?.0.characteristic(signal, f))
    }

    /// Signal + stabilization characteristic function at `f >= 0`.
    pub fn control_cf_at(&mut self, f: f64) -> Result<Complex64> {
        let signal = self.signal_terms_at(f)?.total();
        Ok(self.channel(false)?.0.characteristic(signal, f))
    }

    /// Signal-only (stabilized) density.
    pub fn pt_s(&mut self) -> Result<Arc<DensityCurve>> {
        Ok(self.pt_s_rev()?.0)
    }

    /// Signal + noise density.
    pub fn pt(&mut self) -> Result<Arc<DensityCurve>> {
        Ok(self.pt_rev()?.0)
    }

    /// Noise-only density; an error without noise.
    pub fn pt_n(&mut self) -> Result<Arc<DensityCurve>> {
        Ok(self.pt_n_rev()?.0)
    }

    /// Histogram edges.
    pub fn bin_edges(&mut self) -> Result<Arc<Vec<f64>>> {
        Ok(self.edges_rev()?.0)
    }

    /// Binned signal-only density.
    pub fn bi_s(&mut self) -> Result<Arc<BinnedVid>> {
        Ok(self.bi_s_rev()?.0)
    }

    /// Binned signal + noise density.
    pub fn bi(&mut self) -> Result<Arc<BinnedVid>> {
        Ok(self.bi_rev()?.0)
    }

    /// Binned noise-only density; an error without noise.
    pub fn bi_n(&mut self) -> Result<Arc<BinnedVid>> {
        Ok(self.bi_n_rev()?.0)
    }

    /// Compute every product.
    pub fn report(&mut self) -> Result<VidReport> {
        let has_noise = self.config.noise.effective_sigma() > 0.0;
        let conv = self.conversion()?;
        Ok(VidReport {
            unit: conv.unit,
            redshift: conv.z,
            mean_intensity: self.mean_intensity()?,
            mean_occupancy: self.mean_occupancy()?,
            density_variance: self.density_variance()?,
            pt: (*self.pt()?).clone(),
            pt_s: (*self.pt_s()?).clone(),
            pt_n: if has_noise { Some((*self.pt_n()?).clone()) } else { None },
            bi: (*self.bi()?).clone(),
            bi_s: (*self.bi_s()?).clone(),
            bi_n: if has_noise { Some((*self.bi_n()?).clone()) } else { None },
        })
    }
}
