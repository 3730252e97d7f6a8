use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loan_survival::{CoxModel, KaplanMeierFitter, SurvivalData};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generate_synthetic_data(n_samples: usize, n_features: usize) -> SurvivalData {
    let mut rng = StdRng::seed_from_u64(42);

    // one-hot style covariates, like an encoded categorical design matrix
    let mut covariates_vec = Vec::with_capacity(n_samples * n_features);
    for _ in 0..(n_samples * n_features) {
        covariates_vec.push(if rng.gen_bool(0.3) { 1.0 } else { 0.0 });
    }
    let covariates = Array2::from_shape_vec((n_samples, n_features), covariates_vec).unwrap();

    let mut durations = Vec::with_capacity(n_samples);
    let mut events = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let risk = 0.4 * covariates.row(i).sum();
        let time = (-rng.r#gen::<f64>().ln() / (0.1 * risk.exp())).max(0.1);
        let censoring_time = rng.gen_range(1.0..10.0);
        if time < censoring_time {
            durations.push(time);
            events.push(true);
        } else {
            durations.push(censoring_time);
            events.push(false);
        }
    }

    SurvivalData::new(durations, events, covariates).unwrap()
}

fn benchmark_cox_fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("cox_fitting");

    for &n_samples in [50, 100, 200, 500].iter() {
        for &n_features in [5, 10, 20].iter() {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}x{}", n_samples, n_features)),
                &(n_samples, n_features),
                |b, &(n_samples, n_features)| {
                    let data = generate_synthetic_data(n_samples, n_features);
                    b.iter(|| {
                        let mut model = CoxModel::new()
                            .with_penalizer(0.1)
                            .with_max_iterations(100)
                            .with_tolerance(1e-4);
                        model.fit(black_box(&data)).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

fn benchmark_km_fitting(c: &mut Criterion) {
    let mut group = c.benchmark_group("km_fitting");

    for &n_samples in [100, 1000, 10_000].iter() {
        let data = generate_synthetic_data(n_samples, 1);
        let times: Vec<f64> = data.durations().to_vec();
        let events = data.events().to_vec();

        group.bench_with_input(
            BenchmarkId::from_parameter(n_samples),
            &n_samples,
            |b, _| {
                b.iter(|| {
                    KaplanMeierFitter::new()
                        .fit(black_box(&times), black_box(&events))
                        .unwrap();
                });
            },
        );
    }
    group.finish();
}

fn benchmark_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let train_data = generate_synthetic_data(200, 10);
    let mut model = CoxModel::new().with_penalizer(0.1);
    model.fit(&train_data).unwrap();

    for &n_samples in [50, 500, 5000].iter() {
        let test_data = generate_synthetic_data(n_samples, 10);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_samples", n_samples)),
            &n_samples,
            |b, _| {
                b.iter(|| {
                    model.predict(black_box(test_data.covariates())).unwrap();
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_cox_fitting,
    benchmark_km_fitting,
    benchmark_prediction
);

criterion_main!(benches);
