use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use lottie_core::{CompositionLoader, ControlPoint, KeyframeCurve, TransformResolver};
use serde_json::json;

fn curve_bench(c: &mut Criterion) {
    let points = (0..64)
        .map(|i| {
            ControlPoint::new(i as f32 * 10.0, Vec2::new(i as f32, -(i as f32)))
                .with_ease_out(Vec2::new(0.42, 0.0))
                .with_ease_in(Vec2::new(0.58, 1.0))
        })
        .collect();
    let curve = KeyframeCurve::new(points).unwrap();

    c.bench_function("eased curve value_at", |b| {
        let mut frame = 0.0f32;
        b.iter(|| {
            frame = (frame + 0.7) % 640.0;
            black_box(curve.value_at(black_box(frame)))
        });
    });
}

fn resolve_bench(c: &mut Criterion) {
    let layers: Vec<_> = (1..=100)
        .map(|i| {
            json!({
                "ind": i,
                "parent": if i > 1 { Some(i / 2) } else { None },
                "ks": {
                    "p": { "a": 1, "k": [ { "t": 0, "s": [0, 0] }, { "t": 60, "s": [i, i] } ] },
                    "r": { "a": 1, "k": [ { "t": 0, "s": [0] }, { "t": 60, "s": [360] } ] },
                    "o": { "k": 90 }
                }
            })
        })
        .collect();
    let document = json!({ "ip": 0, "op": 60, "fr": 30, "w": 512, "h": 512, "layers": layers });
    let mut model = CompositionLoader::default().load(&document).unwrap();

    c.bench_function("set_progress + resolve 100 layers", |b| {
        let mut progress = 0.0f32;
        b.iter(|| {
            progress = (progress + 0.013) % 1.0;
            model.set_progress(progress);
            black_box(TransformResolver.resolve(&model))
        });
    });
}

criterion_group!(benches, curve_bench, resolve_bench);
criterion_main!(benches);
