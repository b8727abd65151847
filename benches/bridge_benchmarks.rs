//! Performance benchmarks for the hot paths of the bridge.
//!
//! - Dispatch: host virtual calls routed into Rust overrides
//! - Identity: handle to canonical instance resolution
//! - Codec: Variant encoding and typed container conversion
//!
//! ## Profiling with Puffin
//!
//! ```bash
//! cargo bench --features profile-with-puffin -- --profile-time 5
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hostbind::prelude::*;
use hostbind::{HeadlessHost, HostInterface};

#[cfg(feature = "profile-with-puffin")]
static FRAME_VIEW: std::sync::OnceLock<puffin::GlobalFrameView> = std::sync::OnceLock::new();

#[cfg(feature = "profile-with-puffin")]
fn setup_profiler() {
    puffin::set_scopes_on(true);
    FRAME_VIEW.get_or_init(puffin::GlobalFrameView::default);
}

#[cfg(not(feature = "profile-with-puffin"))]
fn setup_profiler() {}

/// Call at the end of each benchmark iteration to flush profiling data.
#[cfg(feature = "profile-with-puffin")]
fn end_profiling_frame() {
    puffin::GlobalProfiler::lock().new_frame();
}

#[cfg(not(feature = "profile-with-puffin"))]
fn end_profiling_frame() {}

#[derive(Debug, Class)]
struct Mover {
    base: Base,
    #[hostbind(export)]
    distance: f64,
}

impl Subclass for Mover {
    type Parent = Node2D;

    fn init(base: Base) -> Self {
        Self { base, distance: 0.0 }
    }

    fn register(class: &mut ClassBuilder<Self>) {
        class
            .virtual_method("_process", |this: &mut Mover, delta: f64| {
                this.distance += delta;
            })
            .virtual_method("_label", |this: &mut Mover, prefix: String, count: i64| -> String {
                format!("{prefix}{count}:{}", this.distance)
            })
            .method("distance", |this: &mut Mover| -> f64 { this.distance });
    }
}

fn setup() -> (Arc<HeadlessHost>, Bridge) {
    let host = Arc::new(HeadlessHost::new());
    let bridge = Bridge::new(
        Arc::clone(&host) as Arc<dyn HostInterface>,
        BridgeConfig::default().with_integrity_policy(IntegrityPolicy::Report),
    );
    bridge.register::<Mover>().unwrap();
    (host, bridge)
}

fn dispatch_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let (host, bridge) = setup();
    let mover = bridge.instantiate::<Mover>().unwrap();
    let handle = mover.handle();

    let mut group = c.benchmark_group("dispatch");

    let delta = [Variant::Float(0.016)];
    group.bench_function("virtual_one_arg", |b| {
        b.iter(|| {
            black_box(host.call_virtual(handle, "_process", black_box(&delta)));
            end_profiling_frame();
        });
    });

    let label = [Variant::String("step".into()), Variant::Int(3)];
    group.bench_function("virtual_string_return", |b| {
        b.iter(|| black_box(host.call_virtual(handle, "_label", black_box(&label))));
    });

    let method = StringName::from("distance");
    group.bench_function("exported_method", |b| {
        b.iter(|| black_box(host.call_method(handle, &method, &[])));
    });

    group.bench_function("resolve_override", |b| {
        b.iter(|| black_box(bridge.resolve_override("Mover", black_box("_process")).is_some()));
    });

    group.finish();
}

fn identity_benchmarks(c: &mut Criterion) {
    setup_profiler();
    let mut group = c.benchmark_group("identity");

    for live in [1usize, 100, 10_000] {
        let (_host, bridge) = setup();
        let movers: Vec<_> = (0..live).map(|_| bridge.instantiate::<Mover>().unwrap()).collect();
        let sample = movers[live / 2].to_variant();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("decode_subtype", live), &sample, |b, sample| {
            b.iter(|| black_box(bridge.object_from_variant(black_box(sample)).unwrap()));
        });
    }

    let (host, bridge) = setup();
    let node = host.construct_object(&StringName::from("Node")).unwrap();
    let variant = Variant::Object(Some(node));
    group.bench_function("decode_framework_uncached", |b| {
        b.iter(|| black_box(bridge.object_from_variant(black_box(&variant)).unwrap()));
    });

    group.bench_function("create_and_free", |b| {
        b.iter(|| {
            let mover = bridge.instantiate::<Mover>().unwrap();
            host.destroy_object(mover.handle());
            end_profiling_frame();
        });
    });

    group.finish();
}

fn codec_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    for len in [16usize, 1024] {
        let values: Vec<i64> = (0..len as i64).collect();
        group.throughput(Throughput::Elements(len as u64));

        group.bench_with_input(BenchmarkId::new("typed_array_from_vec", len), &values, |b, values| {
            b.iter(|| black_box(TypedArray::<i64>::from_vec(black_box(values.clone())).to_variant()));
        });

        let untyped = VariantArray::new();
        for value in &values {
            untyped.push(Variant::Int(*value)).unwrap();
        }
        let untyped = Variant::Array(untyped);
        group.bench_with_input(BenchmarkId::new("typed_array_convert", len), &untyped, |b, untyped| {
            b.iter(|| black_box(TypedArray::<i64>::from_variant(black_box(untyped)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, dispatch_benchmarks, identity_benchmarks, codec_benchmarks);
criterion_main!(benches);
