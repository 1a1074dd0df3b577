//! Full recommend pass over a synthetic catalog, per user activity level.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nomnom_core::{
    Context, EngineConfig, MealEvent, MealTime, Recommender, Restaurant, Review, Snapshot, User,
    Weekday,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const TAGS: [&str; 6] = ["Malay", "Chinese", "Indian", "Western", "Japanese", "Cafe"];

fn catalog(size: usize) -> Snapshot {
    let mut rng = SmallRng::seed_from_u64(7);
    let restaurants: Vec<Restaurant> = (0..size)
        .map(|i| {
            Restaurant::new(format!("r{i}"), format!("Restaurant {i}"))
                .at(
                    3.0 + rng.random::<f64>() * 0.3,
                    101.5 + rng.random::<f64>() * 0.3,
                )
                .with_tags([
                    TAGS[rng.random_range(0..TAGS.len())],
                    TAGS[rng.random_range(0..TAGS.len())],
                ])
                .with_price("10", "30")
                .with_reviews(rng.random_range(0..2000))
        })
        .collect();

    let mut meals = Vec::new();
    let mut reviews = Vec::new();
    for u in 0..50 {
        for k in 0..30 {
            let restaurant_id = format!("r{}", rng.random_range(0..size));
            meals.push(MealEvent {
                id: format!("u{u}-m{k}"),
                user_id: format!("u{u}"),
                restaurant_id: restaurant_id.clone(),
                date: "2026-02-16".into(),
                day: Weekday::ALL[k % 7],
                meal_time: MealTime::ALL[k % 9],
            });
            if k % 3 == 0 {
                reviews.push(Review {
                    id: format!("u{u}-v{k}"),
                    user_id: format!("u{u}"),
                    restaurant_id,
                    date: "2026-02-16".into(),
                    rating: rng.random_range(1..=5),
                    price_satisfaction: Some(rng.random()),
                    visit_frequency: None,
                });
            }
        }
    }

    Snapshot::new()
        .with_users([User::new("fresh").at(3.1, 101.6), User::new("u0").at(3.1, 101.6)])
        .with_restaurants(restaurants)
        .with_meals(meals)
        .with_reviews(reviews)
}

fn bench_recommend(c: &mut Criterion) {
    let engine = Recommender::new(EngineConfig {
        time_budget_ms: None,
        ..EngineConfig::default()
    });
    let ctx = Context::new(Weekday::Wednesday, 12.5);

    let mut group = c.benchmark_group("recommend");
    for size in [200, 1000] {
        let snap = catalog(size);
        for user in ["fresh", "u0"] {
            let profile = snap.user(user).cloned().unwrap_or_else(|| User::new(user));
            group.bench_with_input(BenchmarkId::new(user, size), &snap, |b, snap| {
                b.iter(|| black_box(engine.recommend_with_context(&profile, snap, &ctx, &[])))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_recommend);
criterion_main!(benches);
