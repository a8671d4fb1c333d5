use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dfm_inference::timeseries::batch::kalman_filter_batch;
use dfm_inference::timeseries::estep::e_step;
use dfm_inference::timeseries::kalman::kalman_filter;
use dfm_inference::timeseries::model::StateSpaceModel;
use dfm_inference::timeseries::smoother::rts_smoother;
use dfm_inference::KalmanConfig;
use nalgebra::{DMatrix, DVector};
use std::hint::black_box;

fn make_x_1d(n: usize) -> DMatrix<f64> {
    // Deterministic signal so runs are stable across machines.
    DMatrix::from_fn(n, 1, |t, _| (t as f64 * 0.01).sin() + (t as f64 * 0.001).cos())
}

fn make_x_panel_partial_missing(n: usize, channels: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, channels, |t, j| {
        if (t + 3 * j) % 10 == 0 {
            f64::NAN
        } else {
            (t as f64 * 0.01 * (j + 1) as f64).sin()
        }
    })
}

/// Two-factor model loading `channels` observed series.
fn dfm_model(channels: usize) -> StateSpaceModel {
    let c = DMatrix::from_fn(channels, 2, |i, j| if j == 0 { 1.0 } else { 0.1 * i as f64 });
    StateSpaceModel::new(
        c,
        DMatrix::from_row_slice(2, 2, &[0.1, 0.0, 0.0, 0.2]),
        DMatrix::identity(channels, channels) * 0.3,
        DMatrix::from_row_slice(2, 2, &[0.9, 0.05, 0.0, 0.7]),
        DVector::zeros(2),
        DMatrix::identity(2, 2),
    )
    .unwrap()
}

fn bench_kalman_filter_1d(c: &mut Criterion) {
    let model = StateSpaceModel::local_level(0.1, 0.2, 0.0, 1.0).unwrap();

    let mut group = c.benchmark_group("timeseries/kalman_filter/1d_local_level");
    for n in [100usize, 1_000, 10_000] {
        let x = make_x_1d(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| {
                let fr = kalman_filter(black_box(&model), black_box(x)).unwrap();
                black_box(fr.log_likelihood);
            });
        });
    }
    group.finish();
}

fn bench_kalman_filter_panel_partial_missing(c: &mut Criterion) {
    let model = dfm_model(8);

    let mut group = c.benchmark_group("timeseries/kalman_filter/8ch_partial_missing");
    for n in [100usize, 1_000, 10_000] {
        let x = make_x_panel_partial_missing(n, 8);
        group.bench_with_input(BenchmarkId::from_parameter(n), &x, |b, x| {
            b.iter(|| {
                let fr = kalman_filter(black_box(&model), black_box(x)).unwrap();
                black_box(fr.log_likelihood);
            });
        });
    }
    group.finish();
}

fn bench_rts_smoother_1d(c: &mut Criterion) {
    let model = StateSpaceModel::local_level(0.1, 0.2, 0.0, 1.0).unwrap();
    let x = make_x_1d(10_000);
    let fr = kalman_filter(&model, &x).unwrap();

    c.bench_function("timeseries/rts_smoother/1d_local_level_n=10000", |b| {
        b.iter(|| {
            let sr = rts_smoother(black_box(&model), black_box(&fr)).unwrap();
            black_box(&sr.smoothed_means);
        });
    });
}

fn bench_e_step_panel(c: &mut Criterion) {
    let model = dfm_model(8);
    let x = make_x_panel_partial_missing(1_000, 8);

    c.bench_function("timeseries/e_step/8ch_n=1000", |b| {
        b.iter(|| {
            let st = e_step(black_box(&model), black_box(&x)).unwrap();
            black_box(&st.gamma);
        });
    });
}

fn bench_filter_batch(c: &mut Criterion) {
    let model = dfm_model(8);
    let xs: Vec<DMatrix<f64>> = (0..32).map(|_| make_x_panel_partial_missing(500, 8)).collect();
    let cfg = KalmanConfig::default();

    c.bench_function("timeseries/kalman_filter_batch/32x500", |b| {
        b.iter(|| {
            let out = kalman_filter_batch(black_box(&model), black_box(&xs), &cfg);
            black_box(out.len());
        });
    });
}

criterion_group!(
    benches,
    bench_kalman_filter_1d,
    bench_kalman_filter_panel_partial_missing,
    bench_rts_smoother_1d,
    bench_e_step_panel,
    bench_filter_batch
);
criterion_main!(benches);
