//! Shared fixtures for integration tests: a small gallery of users, images
//! and likes, and a serializer stand-in that reads entities through a session
//! exactly as far as a schema declares.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Map, Value, json};
use shapeload::prelude::*;

pub const GALLERY: &str = r#"
/// A person with images.
model User {
    id            Int    @id
    first_name    String
    last_name     String
    email         String
    images        Image[]
    default_image Image? @relation(remote: user_id) @where(is_default: true)
    likes         Like[]
}

model Image {
    id             Int     @id
    url            String
    is_default     Boolean
    user_id        Int     @foreign
    user           User    @relation(fields: [user_id])
    users_who_like User[]  @relation(through: Like, local: image_id, remote: user_id)
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
    default_image: ImageSchema
}

schema ImageSchema for Image {
    user: UserSchema
    users_who_like: [UserSchema]
}

schema LikeSchema for Like {
    user: UserSchema
    image: ImageSchema
}

schema ImageForUserDetailSchema extends ImageSchema {
    @@fields([id, url])
}

schema LikeForUserDetailSchema extends LikeSchema {
    image: ImageForUserDetailSchema
    @@fields([id, image])
}

schema UserDetailSchema extends UserSchema {
    images: [ImageForUserDetailSchema]
    likes: [LikeForUserDetailSchema]
    @@exclude([default_image])
}

schema ImageForUserListEltSchema extends ImageSchema {
    @@fields([id, url])
}

schema UserListEltSchema extends UserSchema {
    default_image: ImageForUserListEltSchema
    @@fields([id, first_name, default_image])
}

/// One scalar, a single and a many relation, each pointing back at the owner.
schema OwnerSchema for User {
    first_name
    default_image: PictureSchema
    images: [PictureSchema]
    @@no_auto_fields
}

schema PictureSchema for Image {
    url
    user: OwnerSchema
    @@no_auto_fields
}
"#;

pub fn registry() -> Arc<SchemaRegistry> {
    SchemaRegistry::from_source(GALLERY).expect("gallery definitions are valid")
}

pub fn resolver() -> Resolver {
    Resolver::new(registry())
}

/// Two users, three images and two likes:
///
/// | row | values                                    |
/// |-----|-------------------------------------------|
/// | u   | User 1 (a, b, c)                          |
/// | v   | User 2 (d, e, f)                          |
/// | i0  | Image 1 of u, default                     |
/// | i1  | Image 2 of v, default                     |
/// | i2  | Image 3 of v                              |
/// | r0  | Like 1: u likes i1                        |
/// | r1  | Like 2: v likes i0                        |
pub fn store() -> Arc<MemoryStore> {
    let store = MemoryStore::new(registry());
    let rows = [
        ("User", json!({"id": 1, "first_name": "a", "last_name": "b", "email": "c"})),
        ("User", json!({"id": 2, "first_name": "d", "last_name": "e", "email": "f"})),
        ("Image", json!({"id": 1, "url": "example.com/receiver.jpg", "is_default": true, "user_id": 1})),
        ("Image", json!({"id": 2, "url": "example.com/giver.jpg", "is_default": true, "user_id": 2})),
        ("Image", json!({"id": 3, "url": "example.com/logo.png", "is_default": false, "user_id": 2})),
        ("Like", json!({"id": 1, "user_id": 1, "image_id": 2})),
        ("Like", json!({"id": 2, "user_id": 2, "image_id": 1})),
    ];
    for (model, row) in rows {
        store.insert(model, row).expect("fixture rows are valid");
    }
    store
}

/// A store with `n` users, each owning a default image and a second image.
pub fn populated_store(n: i64) -> Arc<MemoryStore> {
    let store = MemoryStore::new(registry());
    for id in 1..=n {
        store
            .insert(
                "User",
                json!({"id": id, "first_name": format!("f{id}"), "last_name": "l", "email": "e"}),
            )
            .expect("user row");
        for (offset, is_default) in [(0, true), (1, false)] {
            let image = id * 2 - 1 + offset;
            store
                .insert(
                    "Image",
                    json!({"id": image, "url": format!("img/{image}"), "is_default": is_default, "user_id": id}),
                )
                .expect("image row");
        }
    }
    store
}

/// Planner settings that materialize every relation inside the root query.
pub fn joined() -> PlannerConfig {
    PlannerConfig {
        single_strategy: RelationLoadStrategy::Join,
        many_strategy: RelationLoadStrategy::Join,
        ..PlannerConfig::default()
    }
}

/// Serialize `entity` the way an output schema would: every declared scalar,
/// then every declared relation, recursing as far as the plan goes.
///
/// Terminal plan nodes emit their scalars only.
pub fn dump(
    resolver: &Resolver,
    session: &mut Session,
    plan: &PlanNode,
    entity: &EntityRef,
) -> SelectResult<Value> {
    let node = resolver.resolve(&plan.schema)?;
    let mut out = Map::new();
    for field in node.scalar_fields.values() {
        out.insert(field.name.to_string(), session.column(entity, &field.column)?);
    }
    if plan.is_terminal() {
        return Ok(Value::Object(out));
    }

    for spec in node.relation_fields.values() {
        let child = plan
            .children
            .get(&spec.relation)
            .ok_or_else(|| SelectError::internal(format!("no plan node for '{}'", spec.relation)))?;
        let related = session.related(entity, &spec.relation)?;
        let value = if spec.cardinality.is_many() {
            let mut items = Vec::with_capacity(related.len());
            for target in &related {
                items.push(dump(resolver, session, child, target)?);
            }
            Value::Array(items)
        } else {
            match related.first() {
                Some(target) => dump(resolver, session, child, target)?,
                None => Value::Null,
            }
        };
        out.insert(spec.field.to_string(), value);
    }
    Ok(Value::Object(out))
}

/// Dump a list of entities.
pub fn dump_all(
    resolver: &Resolver,
    session: &mut Session,
    plan: &PlanNode,
    entities: &[EntityRef],
) -> SelectResult<Value> {
    let mut items = Vec::with_capacity(entities.len());
    for entity in entities {
        items.push(dump(resolver, session, plan, entity)?);
    }
    Ok(Value::Array(items))
}

pub fn detail_out() -> Value {
    json!({
        "id": 1,
        "first_name": "a",
        "last_name": "b",
        "email": "c",
        "images": [{"id": 1, "url": "example.com/receiver.jpg"}],
        "likes": [{"id": 1, "image": {"id": 2, "url": "example.com/giver.jpg"}}],
    })
}

pub fn list_out() -> Value {
    json!([
        {
            "id": 1,
            "first_name": "a",
            "default_image": {"id": 1, "url": "example.com/receiver.jpg"},
        },
        {
            "id": 2,
            "first_name": "d",
            "default_image": {"id": 2, "url": "example.com/giver.jpg"},
        },
    ])
}
