//! Benchmarks for pattern scanning and Template Grid matching.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gridpat::grid::{pic_similarity, prices_to_pic};
use gridpat::prelude::*;

const GRID: (usize, usize) = (10, 20);

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Generate realistic hourly bars
fn generate_bars(n: usize) -> Vec<Bar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 1.1000;

  for i in 0..n {
    let change = (((i * 7 + 13) % 100) as f64 / 50.0 - 1.0) * 0.0010; // Deterministic "random"
    let volatility = (2.0 + ((i * 3) % 10) as f64 / 5.0) * 0.0005;

    let o = price;
    let c = price + change;
    let h = o.max(c) + volatility * 0.5;
    let l = o.min(c) - volatility * 0.5;

    bars.push(Bar::new(t0() + Duration::hours(i as i64), o, h, l, c, 100.0 + (i % 17) as f64));
    price = c;
  }

  bars
}

/// Library of `n` patterns cut from the generated closes
fn generate_library(n: usize, closes: &[f64]) -> Vec<TemplateGridPattern> {
  let predicates = vec![40.0, 80.0, 40.0, 70.0, 40.0, 60.0, 40.0, 60.0, 40.0, 60.0];
  (0..n)
    .filter_map(|i| {
      let start = (i * 13) % (closes.len() - GRID.1);
      let pic = prices_to_pic(&closes[start..start + GRID.1], GRID).ok()?;
      TemplateGridPattern::from_pic(i as i64, pic, GRID, Timeframe::H1, predicates.clone(), 70.0).ok()
    })
    .collect()
}

fn engine_with(library: Vec<TemplateGridPattern>) -> Arc<TemplateGridEngine> {
  let engine = TemplateGridEngine::new(GridConfig::default());
  engine.set_patterns(library);
  Arc::new(engine)
}

fn scanner_with(store: Arc<MemoryStore>, engine: Arc<TemplateGridEngine>) -> PatternScanner {
  ScannerBuilder::new(store.clone(), store).with_all_defaults(engine).build().unwrap()
}

fn bench_single_detector(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let detector = BuiltinDetector::HeadAndShoulders(HeadAndShouldersDetector::with_defaults());
  let ctx = DetectContext::new("EURUSD", Timeframe::H1);

  c.bench_function("head_and_shoulders_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(detector.detect(black_box(&bars), &ctx));
    })
  });
}

fn bench_full_scan(c: &mut Criterion) {
  let bars = generate_bars(1000);
  let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
  let scanner = scanner_with(Arc::new(MemoryStore::new()), engine_with(generate_library(100, &closes)));

  c.bench_function("scan_all_patterns_1000_bars", |b| {
    b.iter(|| {
      let _ = black_box(scanner.scan_bars("EURUSD", Timeframe::H1, black_box(&bars)));
    })
  });
}

fn bench_scaling(c: &mut Criterion) {
  let scanner = scanner_with(Arc::new(MemoryStore::new()), engine_with(Vec::new()));

  let mut group = c.benchmark_group("scaling");

  for size in [100, 500, 1000, 5000].iter() {
    let bars = generate_bars(*size);

    group.bench_with_input(BenchmarkId::new("scan", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(scanner.scan_bars("EURUSD", Timeframe::H1, black_box(&bars)));
      })
    });
  }

  group.finish();
}

fn bench_similarity(c: &mut Criterion) {
  let closes: Vec<f64> = generate_bars(100).iter().map(|b| b.close).collect();
  let a = prices_to_pic(&closes[..GRID.1], GRID).unwrap();
  let b_pic = prices_to_pic(&closes[40..40 + GRID.1], GRID).unwrap();

  c.bench_function("pic_similarity_10x20", |b| {
    b.iter(|| {
      let _ = black_box(pic_similarity(black_box(&a), black_box(&b_pic)));
    })
  });
}

fn bench_library_match(c: &mut Criterion) {
  let closes: Vec<f64> = generate_bars(2000).iter().map(|b| b.close).collect();
  let mut group = c.benchmark_group("library_match");

  for size in [50, 200, 1000].iter() {
    let engine = engine_with(generate_library(*size, &closes));
    let window = &closes[closes.len() - GRID.1..];
    let price = window[window.len() - 1];

    group.bench_with_input(BenchmarkId::new("detect", size), size, |b, _| {
      b.iter(|| {
        let _ = black_box(engine.detect_patterns_at(black_box(window), "EURUSD", Timeframe::H1, price, t0()));
      })
    });
  }

  group.finish();
}

fn bench_parallel_scan(c: &mut Criterion) {
  let store = Arc::new(MemoryStore::new());
  let bars = generate_bars(1000);
  let symbols = ["SYM1", "SYM2", "SYM3", "SYM4"];
  for symbol in symbols {
    store.upsert_bars(symbol, Timeframe::H1, &bars).unwrap();
  }
  let scanner = scanner_with(store, engine_with(Vec::new()));
  let end = t0() + Duration::hours(1000);
  let units: Vec<ScanUnit> = symbols.iter().map(|s| ScanUnit::new(s, Timeframe::H1, t0(), end)).collect();
  let cancel = AtomicBool::new(false);

  c.bench_function("parallel_scan_4_instruments", |b| {
    b.iter(|| {
      let _ = black_box(scanner.scan_many(black_box(&units), &cancel));
    })
  });
}

criterion_group!(
  benches,
  bench_single_detector,
  bench_full_scan,
  bench_scaling,
  bench_similarity,
  bench_library_match,
  bench_parallel_scan,
);

criterion_main!(benches);
