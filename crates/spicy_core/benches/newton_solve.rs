use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spicy_core::devices::{Bjt, Capacitor, Diode, VoltageSource};
use spicy_core::{Circuit, NewtonConfig, SimulationConfig, Waveform, solve_dc, solve_transient};

fn bias_network(vcc: f64, rc: f64, vbb: f64, rb: f64) -> Circuit {
    let mut builder = Circuit::builder();
    builder.add("Vcc", VoltageSource::new(vcc, rc).expect("valid"), &["c", "0"]);
    builder.add("Vbb", VoltageSource::new(vbb, rb).expect("valid"), &["b", "0"]);
    builder.add("Q1", Bjt::new(1e-12, 0.99).expect("valid"), &["c", "b", "0"]);
    builder.build().expect("build")
}

fn rc_diode() -> Circuit {
    let mut builder = Circuit::builder();
    let source = VoltageSource::new(Waveform::sine(1.0, 0.5, 50.0), 1e3).expect("valid");
    builder.add("V1", source, &["a", "0"]);
    builder.add("D1", Diode::new(1e-14, 1.0).expect("valid"), &["a", "0"]);
    builder.add("C1", Capacitor::new(1e-6).expect("valid"), &["a", "0"]);
    builder.build().expect("build")
}

fn bench_operating_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("bjt_operating_point");
    let config = NewtonConfig::default();
    for (name, circuit) in [
        ("10V_1k_43k", bias_network(10.0, 1e3, 5.0, 43e3)),
        ("100V_8k2_820k", bias_network(100.0, 8.2e3, 100.0, 820e3)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &circuit, |b, circuit| {
            b.iter(|| solve_dc(black_box(circuit), &config).expect("converges"))
        });
    }
    group.finish();
}

fn bench_transient(c: &mut Criterion) {
    let circuit = rc_diode();
    let config = SimulationConfig::default();
    let times: Vec<f64> = (0..=400).map(|i| i as f64 * 5e-5).collect();
    c.bench_function("rc_diode_transient_20ms", |b| {
        b.iter(|| solve_transient(black_box(&circuit), &times, &config).expect("transient"))
    });
}

criterion_group!(benches, bench_operating_point, bench_transient);
criterion_main!(benches);
