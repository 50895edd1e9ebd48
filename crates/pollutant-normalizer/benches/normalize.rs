use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pollutant_normalizer::{normalize, PollutantSchema};
use serde_json::json;

fn bench_normalize(c: &mut Criterion) {
    let schema = PollutantSchema::canonical();
    let payload = json!({
        "pollutants": {
            "pm2_5": "35.2 µg/m³",
            "pm10": null,
            "no": 0.4,
            "no2": "",
            "co": "1.1mg",
            "so2": 2,
            "o3": "bad"
        }
    });

    c.bench_function("normalize_mixed_payload", |b| {
        b.iter(|| normalize(black_box(&payload), &schema))
    });
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
