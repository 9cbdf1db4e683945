//! End-to-end checks of the VID engine against closed-form and Monte Carlo
//! references.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use std::io::Write;
use std::time::{Duration, SystemTime};
use vid_core::Error;
use vid_engine::config::RsdConfig;
use vid_engine::{
    draw_histograms, BinKind, ClusteringConfig, DrawChannel, GaussLegendre, QuadratureSource, Stage, VidConfig,
    VidModel,
};
use vid_models::ModelSpec;
use vid_prob::{normal, poisson};

const MEAN_SOURCES: f64 = 1.5;
const NOISE: f64 = 0.5;

/// Unit-intensity point sources with Poisson occupancy `MEAN_SOURCES` plus
/// Gaussian noise: the VID is a Poisson mixture of Gaussians.
fn poisson_config() -> VidConfig {
    let mut cfg = VidConfig::default();
    cfg.transform.t_max = 25.0;
    cfg.transform.n_t = 512;
    cfg.transform.f_min = 1e-8;
    cfg.transform.f_max = 60.0;
    cfg.transform.nufft_tolerance = 1e-9;
    cfg.quadrature.ift = QuadratureSource::Order(1024);
    cfg.histogram.binning = BinKind::Linear;
    cfg.histogram.t_min = -5.0;
    cfg.histogram.n_bins = 60;
    cfg.scatter.sigma_dex = 0.0;
    cfg.smoothing.enabled = false;
    cfg.clustering = ClusteringConfig::None;
    cfg.noise.sigma = NOISE;
    cfg.control.sigma_stable = 0.2;
    cfg.population.mass_function = ModelSpec::new("power_law").with("A", 1.0).with("alpha", -2.0);
    cfg.population.bias = ModelSpec::new("constant").with("b", 1.0);
    cfg.population.luminosity = ModelSpec::new("constant").with("L", 1.0);
    cfg.population.m_min = 1e10;
    cfg.population.m_max = 1e12;
    cfg.population.n_mass = 40;

    // Occupancy is linear in A and intensity linear in L.
    let mut unit_model = VidModel::new(cfg.clone()).unwrap();
    let occupancy = unit_model.mean_occupancy().unwrap();
    let x_lt = unit_model.conversion().unwrap().x_lt;
    cfg.population.mass_function =
        ModelSpec::new("power_law").with("A", MEAN_SOURCES / occupancy).with("alpha", -2.0);
    cfg.population.luminosity = ModelSpec::new("constant").with("L", 1.0 / x_lt);
    cfg
}

fn compound_poisson_mass(a: f64, b: f64, sigma: f64) -> f64 {
    (0..60u64)
        .map(|n| poisson::pmf(n, MEAN_SOURCES).unwrap() * normal::interval_mass(a, b, n as f64, sigma).unwrap())
        .sum()
}

#[test]
fn test_population_is_tuned() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    assert_relative_eq!(model.mean_occupancy().unwrap(), MEAN_SOURCES, max_relative = 1e-10);
    assert_relative_eq!(model.mean_intensity().unwrap(), MEAN_SOURCES, max_relative = 1e-10);
    let table = model.mass_table().unwrap();
    assert_relative_eq!(table.intensity[0], 1.0, max_relative = 1e-12);
}

#[test]
fn test_binned_vid_matches_compound_poisson() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    let bi = model.bi().unwrap();
    assert_eq!(bi.edges.len(), 61);
    for (i, &p) in bi.probabilities.iter().enumerate() {
        let expected = compound_poisson_mass(bi.edges[i], bi.edges[i + 1], NOISE);
        assert_abs_diff_eq!(p, expected, epsilon = 0.02 * expected + 1e-5);
    }
    assert_abs_diff_eq!(bi.total(), 1.0, epsilon = 1e-3);
}

/// Log bins from 1e-2 to 100 on a 4096-point grid with no instrument noise.
/// Unit point sources need a finite width to be resolved at dT ~ 0.05, so the
/// signal-only channel is compared at a stabilization width of 0.3.
#[test]
fn test_noiseless_log_bins_match_compound_poisson() {
    const SIGMA: f64 = 0.3;
    let mut cfg = poisson_config();
    cfg.transform.t_max = 100.0;
    cfg.transform.n_t = 4096;
    cfg.histogram.binning = BinKind::Log;
    cfg.histogram.t_min = 1e-2;
    cfg.histogram.n_bins = 40;
    cfg.noise.sigma = 0.0;
    cfg.control.sigma_stable = SIGMA;
    let mut model = VidModel::new(cfg).unwrap();

    let bi_s = model.bi_s().unwrap();
    assert_eq!(bi_s.edges.len(), 41);
    assert_relative_eq!(bi_s.edges[0], 1e-2, max_relative = 1e-12);
    assert_relative_eq!(bi_s.edges[40], 100.0, max_relative = 1e-12);
    for (i, &p) in bi_s.probabilities.iter().enumerate() {
        let expected = compound_poisson_mass(bi_s.edges[i], bi_s.edges[i + 1], SIGMA);
        if expected > 1e-4 {
            assert_relative_eq!(p, expected, max_relative = 0.01);
        } else {
            assert_abs_diff_eq!(p, expected, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_densities_are_normalized() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    for curve in [model.pt().unwrap(), model.pt_s().unwrap(), model.pt_n().unwrap()] {
        assert_abs_diff_eq!(curve.norm, 1.0, epsilon = 0.05);
    }
    let pt = model.pt().unwrap();
    assert_abs_diff_eq!(pt.mean(), MEAN_SOURCES, epsilon = 1e-3);

    // Signal-only density is the same mixture with the stabilization width.
    let pt_s = model.pt_s().unwrap();
    let peak = pt_s.t.iter().position(|&t| t.abs() < 1e-12).unwrap();
    let expected = (0..40u64)
        .map(|n| poisson::pmf(n, MEAN_SOURCES).unwrap() * normal::pdf(0.0, n as f64, 0.2).unwrap())
        .sum::<f64>();
    assert_relative_eq!(pt_s.density[peak], expected, max_relative = 1e-2);
}

#[test]
fn test_characteristic_function_at_zero() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    let one = model.full_cf_at(0.0).unwrap();
    assert_abs_diff_eq!(one.re, 1.0, epsilon = 1e-14);
    assert_abs_diff_eq!(one.im, 0.0, epsilon = 1e-14);

    // Poisson with unit jumps: exp(λ(e^{-if} - 1) - f²σ²/2).
    let f = 0.8;
    let got = model.full_cf_at(f).unwrap();
    let expected = (num_complex::Complex64::new(0.0, -f).exp() - 1.0) * MEAN_SOURCES;
    let expected = (expected - 0.5 * f * f * NOISE * NOISE).exp();
    assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-10);
    assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-10);
}

#[test]
fn test_mean_subtraction_centers_the_distribution() {
    let mut cfg = poisson_config();
    cfg.control.subtract_mean = true;
    let mut model = VidModel::new(cfg).unwrap();
    let pt = model.pt().unwrap();
    assert_abs_diff_eq!(pt.mean(), 0.0, epsilon = 1e-3);
}

#[test]
fn test_noise_change_keeps_signal() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    model.pt().unwrap();
    model.pt_s().unwrap();
    assert_eq!(model.compute_count(Stage::SignalCumulant), 1);

    let mut cfg = model.config().clone();
    cfg.noise.sigma = 0.7;
    model.update(cfg).unwrap();
    model.pt().unwrap();
    model.pt_s().unwrap();
    assert_eq!(model.compute_count(Stage::SignalCumulant), 1);
    assert_eq!(model.compute_count(Stage::ControlCf), 1);
    assert_eq!(model.compute_count(Stage::PtS), 1);
    assert_eq!(model.compute_count(Stage::FullCf), 2);
    assert_eq!(model.compute_count(Stage::Pt), 2);
}

#[test]
fn test_histogram_change_rebins_only() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    model.bi().unwrap();
    let mut cfg = model.config().clone();
    cfg.histogram.n_bins = 30;
    model.update(cfg).unwrap();
    let bi = model.bi().unwrap();
    assert_eq!(bi.probabilities.len(), 30);
    assert_eq!(model.compute_count(Stage::BinEdges), 2);
    assert_eq!(model.compute_count(Stage::Bi), 2);
    assert_eq!(model.compute_count(Stage::Pt), 1);
    assert_eq!(model.compute_count(Stage::FrequencyGrid), 1);
}

#[test]
fn test_identical_update_is_free() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    model.bi().unwrap();
    let cfg = model.config().clone();
    model.update(cfg).unwrap();
    model.bi().unwrap();
    for stage in [Stage::MassTable, Stage::SignalCumulant, Stage::Pt, Stage::Bi, Stage::InversePlan] {
        assert_eq!(model.compute_count(stage), 1, "{:?}", stage);
    }
}

#[test]
fn test_inverse_quadrature_change_keeps_population() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    model.pt().unwrap();
    let mut cfg = model.config().clone();
    cfg.quadrature.ift = QuadratureSource::Order(1200);
    model.update(cfg).unwrap();
    model.pt().unwrap();
    assert_eq!(model.compute_count(Stage::IftQuadrature), 2);
    assert_eq!(model.compute_count(Stage::FrequencyGrid), 2);
    assert_eq!(model.compute_count(Stage::SignalCumulant), 2);
    assert_eq!(model.compute_count(Stage::ReferenceTransform), 1);
    assert_eq!(model.compute_count(Stage::FtQuadrature), 1);
    assert_eq!(model.compute_count(Stage::MassTable), 1);
    assert_eq!(model.compute_count(Stage::InversePlan), 1);
}

#[test]
fn test_rewritten_quadrature_table_is_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gl.txt");
    GaussLegendre::new(1024).unwrap().write_table(&path).unwrap();

    let mut cfg = poisson_config();
    cfg.quadrature.ift = QuadratureSource::Table(path.clone());
    let mut model = VidModel::new(cfg).unwrap();
    let before = model.pt().unwrap();
    model.pt().unwrap();
    assert_eq!(model.compute_count(Stage::IftQuadrature), 1);
    assert_eq!(model.compute_count(Stage::Pt), 1);

    // Same path, new contents; push the mtime forward so coarse filesystem
    // clocks still see a change.
    GaussLegendre::new(1200).unwrap().write_table(&path).unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    drop(file);

    let after = model.pt().unwrap();
    assert_eq!(model.compute_count(Stage::IftQuadrature), 2);
    assert_eq!(model.compute_count(Stage::FrequencyGrid), 2);
    assert_eq!(model.compute_count(Stage::Pt), 2);
    assert_eq!(model.compute_count(Stage::MassTable), 1);
    assert_abs_diff_eq!(after.mean(), before.mean(), epsilon = 1e-3);
}

#[test]
fn test_luminosity_change_rebuilds_mass_table_only() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    model.pt().unwrap();
    let before = model.mean_intensity().unwrap();
    let mut cfg = model.config().clone();
    let l = cfg.population.luminosity.param("L").unwrap();
    cfg.population.luminosity = ModelSpec::new("constant").with("L", 2.0 * l);
    model.update(cfg).unwrap();
    model.pt().unwrap();
    assert_relative_eq!(model.mean_intensity().unwrap(), 2.0 * before, max_relative = 1e-12);
    assert_eq!(model.compute_count(Stage::MassTable), 2);
    assert_eq!(model.compute_count(Stage::Conversion), 1);
    assert_eq!(model.compute_count(Stage::Smoothing), 1);
    assert_eq!(model.compute_count(Stage::ReferenceTransform), 1);
    assert_eq!(model.compute_count(Stage::FrequencyGrid), 1);
}

#[test]
fn test_monte_carlo_matches_binned_vid() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    let bi = model.bi().unwrap();
    let (n_draws, n_voxels) = (1000, 200);
    let draws = draw_histograms(&mut model, n_draws, n_voxels, 20240917, DrawChannel::Full).unwrap();
    assert_eq!(draws.edges, bi.edges);
    let total = (n_draws * n_voxels) as f64;
    for (&p, &m) in bi.probabilities.iter().zip(&draws.mean_probabilities) {
        let expected = p * total;
        if expected > 50.0 {
            let observed = m * total;
            assert!(
                (observed - expected).abs() <= 5.0 * expected.sqrt() + 0.01 * expected,
                "observed {} expected {}",
                observed,
                expected
            );
        }
    }
}

#[test]
fn test_scatter_preserves_mean() {
    let mut cfg = poisson_config();
    cfg.scatter.sigma_dex = 0.3;
    cfg.quadrature.ft = QuadratureSource::Order(16);
    cfg.quadrature.ft_panels = 1024;
    let mut model = VidModel::new(cfg).unwrap();
    let mean = model.mean_intensity().unwrap();
    let pt = model.pt().unwrap();
    assert_abs_diff_eq!(pt.norm, 1.0, epsilon = 0.05);
    assert_relative_eq!(pt.mean(), mean, max_relative = 0.02);
}

#[test]
fn test_smoothing_with_fixed_clustering() {
    let mut cfg = poisson_config();
    cfg.smoothing.enabled = true;
    cfg.smoothing.n_sigma = 6.0;
    cfg.smoothing.tolerance_decimals = 4;
    cfg.clustering = ClusteringConfig::Fixed { variance: 0.1 };
    cfg.population.n_mass = 8;
    let mut model = VidModel::new(cfg).unwrap();
    assert_eq!(model.density_variance().unwrap(), 0.1);
    assert!(model.smoothing().unwrap().for_mass(0).len() > 1);
    let pt = model.pt().unwrap();
    assert_abs_diff_eq!(pt.norm, 1.0, epsilon = 0.05);

    let terms = model.signal_terms_at(0.5).unwrap();
    assert!(terms.clustering.re < 0.0);
}

fn power_table() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "# k [1/Mpc]  P(k) [Mpc^3]").unwrap();
    for i in 0..=120 {
        let k = 10f64.powf(-4.0 + 7.0 * i as f64 / 120.0);
        let x = k / 0.02;
        writeln!(file, "{:.8e} {:.8e}", k, 2e4 * x / (1.0 + x.powf(2.8))).unwrap();
    }
    file.flush().unwrap();
    file
}

#[test]
fn test_power_spectrum_variance_and_rsd() {
    let table = power_table();
    let mut cfg = poisson_config();
    cfg.clustering = ClusteringConfig::PowerSpectrum {
        table: table.path().to_path_buf(),
        k_min: 1e-3,
        k_max: 10.0,
        n_k: 24,
        rsd: None,
    };
    let mut model = VidModel::new(cfg.clone()).unwrap();
    let real = model.density_variance().unwrap();
    assert!(real > 0.0);

    cfg.clustering = ClusteringConfig::PowerSpectrum {
        table: table.path().to_path_buf(),
        k_min: 1e-3,
        k_max: 10.0,
        n_k: 24,
        rsd: Some(RsdConfig { damping: "gaussian".into(), sigma_nl_mpc: 0.0, growth_rate: Some(0.8) }),
    };
    model.update(cfg).unwrap();
    let kaiser = model.density_variance().unwrap();
    assert_eq!(model.compute_count(Stage::DensityVariance), 2);
    assert!(kaiser > real);
}

#[test]
fn test_invalid_damping_is_rejected() {
    let yaml = "clustering:\n  type: power_spectrum\n  table: pk.txt\n  rsd:\n    damping: tophat\n";
    assert!(matches!(VidConfig::from_yaml_str(yaml), Err(Error::Validation(_))));
}

#[test]
fn test_unknown_model_is_rejected() {
    let mut cfg = poisson_config();
    cfg.population.mass_function = ModelSpec::new("sheth_tormen");
    assert!(matches!(VidModel::new(cfg), Err(Error::UnknownModel { .. })));
}

#[test]
fn test_failed_update_leaves_model_unchanged() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    let mut bad = model.config().clone();
    bad.transform.f_min = 0.0;
    assert!(model.update(bad).is_err());
    assert_eq!(model.config().transform.f_min, 1e-8);

    let mut unknown = model.config().clone();
    unknown.population.bias = ModelSpec::new("tinker");
    assert!(model.update(unknown).is_err());
    assert_eq!(model.config().population.bias.name, "constant");
}

#[test]
fn test_point_queries_reject_bad_input() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    assert!(model.full_cf_at(-1.0).is_err());
    assert!(model.signal_terms_at(f64::NAN).is_err());

    let mut cfg = poisson_config();
    cfg.noise.sigma = 0.0;
    let mut quiet = VidModel::new(cfg).unwrap();
    assert!(quiet.pt_n().is_err());
    assert!(quiet.report().unwrap().pt_n.is_none());
}

#[test]
fn test_report_serializes() {
    let mut model = VidModel::new(poisson_config()).unwrap();
    let report = model.report().unwrap();
    assert!(report.redshift > 0.0);
    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(v["pt"]["t"].as_array().unwrap().len(), 512);
    assert_eq!(v["bi"]["probabilities"].as_array().unwrap().len(), 60);
    assert!(v["pt_n"].is_object());
    assert!(v["mean_intensity"].as_f64().unwrap() > 0.0);
}
