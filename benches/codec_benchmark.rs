use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use grid_quantizer::codec::{decode, derive_scheme, encode, estimate_range, quantize_variable};
use grid_quantizer::models::{TargetDtype, Variable};
use grid_quantizer::processors::ParallelQuantizer;

// Smooth synthetic field with a sprinkling of gaps
fn create_test_field(len: usize, with_gaps: bool) -> Vec<f64> {
    (0..len)
        .map(|i| {
            if with_gaps && i % 97 == 0 {
                f64::NAN
            } else {
                let x = i as f64 * 0.001;
                280.0 + 15.0 * x.sin() + 3.0 * (7.0 * x).cos()
            }
        })
        .collect()
}

fn benchmark_estimate_range(c: &mut Criterion) {
    let values = create_test_field(1_000_000, true);

    c.bench_function("estimate_range_1m", |b| {
        b.iter(|| black_box(estimate_range(&values).map(|e| e.valid_count).unwrap_or(0)))
    });
}

fn benchmark_encode_by_dtype(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_by_dtype");
    let values = create_test_field(1_000_000, false);
    let shape = [values.len()];

    for dtype in TargetDtype::ALL {
        let range = match estimate_range(&values) {
            Ok(estimate) => estimate.range,
            Err(_) => continue,
        };
        let scheme = match derive_scheme(range, dtype, false) {
            Ok(scheme) => scheme,
            Err(_) => continue,
        };

        group.bench_with_input(BenchmarkId::new("encode", dtype), &scheme, |b, scheme| {
            b.iter(|| black_box(encode(&values, &shape, scheme).map(|e| e.len()).unwrap_or(0)))
        });
    }
    group.finish();
}

fn benchmark_decode(c: &mut Criterion) {
    let variable = Variable::from_vec("t2m", create_test_field(1_000_000, true));
    let quantized = match quantize_variable(&variable, TargetDtype::I2) {
        Ok(q) => q,
        Err(_) => return,
    };

    c.bench_function("decode_i2_1m", |b| {
        b.iter(|| {
            black_box(
                decode(&quantized.encoded, &quantized.scheme)
                    .map(|v| v.len())
                    .unwrap_or(0),
            )
        })
    });
}

fn benchmark_parallel_quantizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_quantizer_by_variables");

    for &count in &[1, 4, 16] {
        let variables: Vec<Variable> = (0..count)
            .map(|i| Variable::from_vec(format!("var{}", i), create_test_field(250_000, false)))
            .collect();

        group.bench_with_input(BenchmarkId::new("variables", count), &variables, |b, vars| {
            let quantizer = ParallelQuantizer::default().with_dtype(TargetDtype::U2);
            b.iter(|| {
                black_box(
                    quantizer
                        .quantize_all(vars, None)
                        .map(|o| o.quantized.len())
                        .unwrap_or(0),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_estimate_range,
    benchmark_encode_by_dtype,
    benchmark_decode,
    benchmark_parallel_quantizer
);
criterion_main!(benches);
