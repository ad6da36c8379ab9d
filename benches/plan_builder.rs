//! Benchmarks for building, applying and executing load plans.

use std::fmt::Write as _;
use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use shapeload::prelude::*;
use shapeload::query::DirectiveRecorder;

const GALLERY: &str = r#"
model User {
    id         Int    @id
    first_name String
    email      String
    images     Image[]
    likes      Like[]
}
model Image {
    id      Int    @id
    url     String
    user_id Int    @foreign
    user    User
}
model Like {
    id       Int @id
    user_id  Int @foreign
    image_id Int @foreign
    user     User
    image    Image
}
schema UserSchema for User {
    images: [ImageSchema]
    likes: [LikeSchema]
}
schema ImageSchema for Image {
    user: UserSchema
}
schema LikeSchema for Like {
    user: UserSchema
    image: ImageSchema
}
"#;

/// A chain of `depth` models, each pointing at the next, with a schema per
/// level nesting the next level's schema.
fn chain_source(depth: usize) -> String {
    let mut out = String::new();
    for level in 0..depth {
        let _ = writeln!(out, "model M{level} {{\n    id Int @id\n    name String");
        if level + 1 < depth {
            let _ = writeln!(out, "    next_id Int @foreign\n    next M{} @relation(fields: [next_id])", level + 1);
        }
        let _ = writeln!(out, "}}");
        let _ = writeln!(out, "schema S{level} for M{level} {{");
        if level + 1 < depth {
            let _ = writeln!(out, "    next: S{}", level + 1);
        }
        let _ = writeln!(out, "}}");
    }
    out
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_build");

    let resolver = Resolver::new(SchemaRegistry::from_source(GALLERY).unwrap());
    group.bench_function("gallery_cyclic", |b| {
        let builder = PlanBuilder::new(&resolver);
        b.iter(|| black_box(builder.build_name("UserSchema").unwrap()))
    });

    for depth in [2, 8, 32] {
        let resolver = Resolver::new(SchemaRegistry::from_source(&chain_source(depth)).unwrap());
        group.bench_with_input(BenchmarkId::new("chain", depth), &depth, |b, _| {
            let builder = PlanBuilder::new(&resolver);
            b.iter(|| black_box(builder.build_name("S0").unwrap()))
        });
    }

    group.finish();
}

fn bench_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_cache");
    let resolver = Resolver::new(SchemaRegistry::from_source(GALLERY).unwrap());
    let builder = PlanBuilder::new(&resolver);
    let cache = PlanCache::new();
    let key = SchemaKey::new("UserSchema");
    cache.get_or_build(&builder, &key).unwrap();

    group.bench_function("hit", |b| {
        b.iter(|| black_box(cache.get_or_build(&builder, &key).unwrap()))
    });

    group.finish();
}

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_apply");
    let resolver = Resolver::new(SchemaRegistry::from_source(GALLERY).unwrap());
    let filter = SchemaFilter::new(&resolver, "UserSchema", true).unwrap();

    group.bench_function("recorder", |b| {
        b.iter(|| black_box(filter.apply(DirectiveRecorder::new()).unwrap()))
    });

    group.finish();
}

fn populated(registry: Arc<SchemaRegistry>, users: i64) -> Arc<MemoryStore> {
    let store = MemoryStore::new(registry);
    for id in 1..=users {
        store
            .insert("User", json!({"id": id, "first_name": "f", "email": "e"}))
            .unwrap();
        for n in 0..3 {
            let image = id * 3 + n;
            store
                .insert("Image", json!({"id": image, "url": "u", "user_id": id}))
                .unwrap();
            store
                .insert("Like", json!({"id": image, "user_id": id, "image_id": image}))
                .unwrap();
        }
    }
    store
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");
    let registry = SchemaRegistry::from_source(GALLERY).unwrap();
    let resolver = Resolver::new(registry.clone());
    let filter = SchemaFilter::new(&resolver, "UserSchema", true).unwrap();

    for users in [10, 100, 1000] {
        let store = populated(registry.clone(), users);
        group.throughput(Throughput::Elements(users as u64));
        group.bench_with_input(BenchmarkId::new("separate", users), &users, |b, _| {
            b.iter(|| {
                let mut session = store.session();
                let query = filter.apply(store.query("User").unwrap()).unwrap();
                black_box(query.execute(&mut session).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_cache, bench_apply, bench_execute);

criterion_main!(benches);
