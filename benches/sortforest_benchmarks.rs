use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sortforest::dataset::{DataManagement, TrainingData};
use sortforest::table::{FeatureTable, Representation};
use sortforest::tree::warm_start::WarmStartMode;
use sortforest::{Matrix, SquaredErrorScorer, Tree, TreeConfig};
use std::time::Duration;

fn problem(rows: usize, cols: usize, density: f64) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(0);
    let mut x = vec![0.0; rows * cols];
    for v in x.iter_mut() {
        if rng.gen::<f64>() < density {
            *v = rng.gen_range(-100.0..100.0);
        }
    }
    let y = (0..rows)
        .map(|i| x[i] - 0.5 * x[rows + i] + rng.gen::<f64>())
        .collect();
    (x, y)
}

pub fn sorted_index_benchmarks(c: &mut Criterion) {
    let rows = 20_000;
    let cols = 10;
    let (x, _) = problem(rows, cols, 0.2);
    let m = Matrix::new(&x, rows, cols);
    let all: Vec<usize> = (0..rows).collect();

    c.bench_function("bootstrap dense", |b| {
        b.iter(|| FeatureTable::bootstrap(black_box(&m), black_box(&all), Representation::Dense))
    });
    c.bench_function("bootstrap sparse", |b| {
        b.iter(|| FeatureTable::bootstrap(black_box(&m), black_box(&all), Representation::Sparse))
    });

    for representation in [Representation::Dense, Representation::Sparse] {
        let table = match FeatureTable::bootstrap(&m, &all, representation) {
            Ok(t) => t,
            Err(e) => panic!("{}", e),
        };
        c.bench_function(&format!("enumerate thresholds {:?}", representation), |b| {
            b.iter(|| {
                (0..cols)
                    .map(|fx| table.sorted(fx).runs().map(|r| r.ids.len()).sum::<usize>())
                    .sum::<usize>()
            })
        });
    }
}

pub fn tree_benchmarks(c: &mut Criterion) {
    let rows = 10_000;
    let cols = 5;
    let (x, y) = problem(rows, cols, 0.5);
    let m = Matrix::new(&x, rows, cols);

    let mut group = c.benchmark_group("grow_tree");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));
    for data_management in [DataManagement::Dense, DataManagement::Sparse] {
        let config = TreeConfig {
            data_management,
            max_leaves: Some(32),
            min_leaf_size: 20,
            ..TreeConfig::default()
        };
        let data = TrainingData::new(&m, &config).unwrap();
        let scorer = SquaredErrorScorer::from_config(&y, None, &config).unwrap();
        group.bench_function(format!("grow {:?}", data_management), |b| {
            b.iter(|| {
                let mut tree = Tree::grow_root(&data, None, &config).unwrap();
                tree.grow(&scorer, &config).unwrap();
                black_box(tree.leaf_count())
            })
        });

        let mut tree = Tree::grow_root(&data, None, &config).unwrap();
        tree.grow(&scorer, &config).unwrap();
        let model = tree.model();
        for mode in [WarmStartMode::Exact, WarmStartMode::Fast] {
            group.bench_function(format!("warm start {:?} {:?}", mode, data_management), |b| {
                b.iter(|| Tree::warm_start(&data, black_box(&model), None, &config, mode).unwrap().leaf_count())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, sorted_index_benchmarks, tree_benchmarks);
criterion_main!(benches);
