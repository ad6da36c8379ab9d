//! End-to-end loading against the in-memory store.
//!
//! Each test counts round trips while fetching entities and then serializing
//! them through a schema, with and without a load plan installed.

mod common;

use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use serde_json::json;
use shapeload::prelude::*;
use shapeload::query::{DirectiveRecorder, ErrorCode};

/// Without a plan the detail schema lazily loads three relations while
/// serializing; with a joined plan everything arrives with the root query.
#[test]
fn test_detail_scenario() {
    let resolver = common::resolver();
    let store = common::store();
    let plan = PlanBuilder::new(&resolver).build_name("UserDetailSchema").unwrap();

    let mut session = store.session();
    let users = store
        .query("User")
        .unwrap()
        .filter_eq("id", 1)
        .execute(&mut session)
        .unwrap();
    assert_eq!(store.round_trips(), 1, "unfiltered: 1 to fetch");
    let data = common::dump(&resolver, &mut session, &plan, &users[0]).unwrap();
    assert_eq!(data, common::detail_out());
    assert_eq!(store.round_trips(), 4, "unfiltered: 3 to dump");

    store.reset_round_trips();
    let mut session = store.session();
    let filter = SchemaFilter::with_config(&resolver, "UserDetailSchema", &common::joined()).unwrap();
    let query = filter
        .apply(store.query("User").unwrap().filter_eq("id", 1))
        .unwrap();
    let users = query.execute(&mut session).unwrap();
    assert_eq!(store.round_trips(), 1, "filtered: 1 to fetch");
    let data = common::dump(&resolver, &mut session, filter.plan(), &users[0]).unwrap();
    assert_eq!(data, common::detail_out());
    assert_eq!(store.round_trips(), 1, "filtered: 0 to dump");
}

/// The list schema reads one relation per user; a joined plan fetches them
/// with the users and leaves the default images in the identity map.
#[test]
fn test_list_scenario() {
    let resolver = common::resolver();
    let store = common::store();
    let plan = PlanBuilder::new(&resolver).build_name("UserListEltSchema").unwrap();

    let mut session = store.session();
    let users = store.query("User").unwrap().execute(&mut session).unwrap();
    assert_eq!(store.round_trips(), 1, "unfiltered: 1 to fetch");
    let data = common::dump_all(&resolver, &mut session, &plan, &users).unwrap();
    assert_eq!(data, common::list_out());
    assert_eq!(store.round_trips(), 3, "unfiltered: 2 to dump");

    store.reset_round_trips();
    let mut session = store.session();
    let filter = SchemaFilter::with_config(&resolver, "UserListEltSchema", &common::joined()).unwrap();
    let users = filter
        .apply(store.query("User").unwrap())
        .unwrap()
        .execute(&mut session)
        .unwrap();
    assert_eq!(store.round_trips(), 1, "filtered: 1 to fetch");
    let data = common::dump_all(&resolver, &mut session, filter.plan(), &users).unwrap();
    assert_eq!(data, common::list_out());
    assert_eq!(store.round_trips(), 1, "filtered: 0 to dump");

    // Default images were loaded along the way; the third image was not.
    let fetched_0 = session.get("Image", 1).unwrap().unwrap();
    let fetched_1 = session.get("Image", 2).unwrap().unwrap();
    assert_eq!(store.round_trips(), 1, "already have both default images");
    assert_eq!(session.column(&fetched_0, "id").unwrap(), json!(1));
    assert_eq!(session.column(&fetched_1, "id").unwrap(), json!(2));

    let other = session.get("Image", 3).unwrap().unwrap();
    assert_eq!(store.round_trips(), 2, "did not get the other image");
    assert_eq!(session.column(&other, "url").unwrap(), json!("example.com/logo.png"));
}

/// One scalar, a single and a many relation, each with a back-reference to
/// the root schema: three round trips whatever the number of roots, no more
/// while serializing, and undeclared access is rejected.
#[test]
fn test_round_trips_independent_of_root_count() {
    let resolver = common::resolver();
    let filter = SchemaFilter::new(&resolver, "OwnerSchema", true).unwrap();
    assert_eq!(filter.plan().depth(), 2);
    let paths = filter.plan().relation_paths().len();

    for n in [1, 4, 32] {
        let store = common::populated_store(n);
        let mut session = store.session();
        let users = filter
            .apply(store.query("User").unwrap())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        assert_eq!(users.len(), n as usize);
        assert_eq!(store.round_trips(), 3, "{n} roots");
        assert!(store.round_trips() <= paths as u64 + 1);

        let data = common::dump_all(&resolver, &mut session, filter.plan(), &users).unwrap();
        assert_eq!(store.round_trips(), 3, "{n} roots: nothing more to dump");
        assert_eq!(
            data[0],
            json!({
                "first_name": "f1",
                "default_image": {"url": "img/1", "user": {"first_name": "f1"}},
                "images": [
                    {"url": "img/1", "user": {"first_name": "f1"}},
                    {"url": "img/2", "user": {"first_name": "f1"}},
                ],
            })
        );

        let err = session.related(&users[0], "likes").unwrap_err();
        assert!(err.is_unplanned_load());
        assert_eq!(err.code, ErrorCode::UnplannedLoad);
        assert!(session.column(&users[0], "email").unwrap_err().is_unplanned_load());
        assert_eq!(store.round_trips(), 3);
    }
}

/// The round-trip bound holds for separate loading of every path.
#[test]
fn test_separate_loading_bound() {
    let resolver = common::resolver();
    let store = common::store();
    let filter = SchemaFilter::new(&resolver, "UserDetailSchema", true).unwrap();
    let k = filter.plan().relation_paths().len() as u64;

    let mut session = store.session();
    let users = filter
        .apply(store.query("User").unwrap())
        .unwrap()
        .execute(&mut session)
        .unwrap();
    let fetched = store.round_trips();
    assert!(fetched <= k + 1, "{fetched} round trips for {k} paths");

    let data = common::dump_all(&resolver, &mut session, filter.plan(), &users).unwrap();
    assert_eq!(data[0], common::detail_out());
    assert_eq!(store.round_trips(), fetched);
}

/// The directives issued for the detail schema, in order.
#[test]
fn test_detail_directives() {
    let resolver = common::resolver();
    let filter = SchemaFilter::new(&resolver, "UserDetailSchema", true).unwrap();
    let recorder = filter.apply(DirectiveRecorder::new()).unwrap();

    assert_snapshot!(recorder.render(), @r"
    <root>: load_only(id, first_name, last_name, email)
    <root>: forbid_unplanned(raise)
    images: eager_load(many, separate)
    images: forbid_unplanned(raise)
    images: load_only(id, url)
    likes: eager_load(many, separate)
    likes: forbid_unplanned(raise)
    likes: load_only(id)
    likes.image: eager_load(one, separate)
    likes.image: forbid_unplanned(raise)
    likes.image: load_only(id, url)
    ");
}

/// Under `noload`, unplanned access yields nothing and costs nothing.
#[test]
fn test_noload_policy() {
    let resolver = common::resolver();
    let store = common::store();
    let config = PlannerConfig {
        unplanned: UnplannedAccess::Noload,
        ..PlannerConfig::default()
    };
    let filter = SchemaFilter::with_config(&resolver, "UserListEltSchema", &config).unwrap();

    let mut session = store.session();
    let users = filter
        .apply(store.query("User").unwrap())
        .unwrap()
        .execute(&mut session)
        .unwrap();
    let fetched = store.round_trips();

    assert!(session.related(&users[0], "likes").unwrap().is_empty());
    assert_eq!(session.column(&users[0], "email").unwrap(), serde_json::Value::Null);
    assert_eq!(store.round_trips(), fetched);
}

/// Without enforcement the plan still projects and eager loads, but anything
/// outside it loads lazily.
#[test]
fn test_unenforced_plan_allows_lazy_loads() {
    let resolver = common::resolver();
    let store = common::store();
    let filter = SchemaFilter::new(&resolver, "UserListEltSchema", false).unwrap();

    let mut session = store.session();
    let users = filter
        .apply(store.query("User").unwrap())
        .unwrap()
        .execute(&mut session)
        .unwrap();
    let fetched = store.round_trips();

    let likes = session.related(&users[0], "likes").unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(store.round_trips(), fetched + 1);

    assert_eq!(session.column(&users[0], "email").unwrap(), json!("c"));
    assert_eq!(store.round_trips(), fetched + 2);
}

/// A relation the store cannot join fails the whole application with the
/// path and directive that caused it.
#[test]
fn test_unsupported_join_is_reported() {
    let resolver = common::resolver();
    let store = common::store();
    let filter = SchemaFilter::with_config(&resolver, "UserSchema", &common::joined()).unwrap();

    let err = filter.apply(store.query("User").unwrap()).unwrap_err();
    assert_eq!(err.path, RelationPath::parse("images.users_who_like"));
    assert_eq!(
        err.to_string(),
        "cannot apply `eager_load(many, join)` at 'images.users_who_like': relation 'users_who_like' is not supported: many-to-many relations cannot be joined"
    );

    let err = SelectError::from(err);
    assert!(err.is_application_error());
    assert_eq!(err.context.path.as_deref(), Some("images.users_who_like"));
}

/// Many-to-many relations load with one select-in through the link model.
#[test]
fn test_many_to_many_separate() {
    let resolver = common::resolver();
    let store = common::store();
    let key = SchemaKey::new("ImageSchema").only(["id", "users_who_like.first_name"]);
    let filter = SchemaFilter::new(&resolver, key, true).unwrap();

    let mut session = store.session();
    let images = filter
        .apply(store.query("Image").unwrap())
        .unwrap()
        .execute(&mut session)
        .unwrap();
    assert_eq!(store.round_trips(), 2);

    let data = common::dump_all(&resolver, &mut session, filter.plan(), &images).unwrap();
    assert_eq!(
        data,
        json!([
            {"id": 1, "users_who_like": [{"first_name": "d"}]},
            {"id": 2, "users_who_like": [{"first_name": "a"}]},
            {"id": 3, "users_who_like": []},
        ])
    );
    assert_eq!(store.round_trips(), 2);
}

/// Reading a relation the model does not declare is an error, not a load.
#[test]
fn test_undeclared_relation() {
    let store = common::store();
    let mut session = store.session();
    let users = store.query("User").unwrap().execute(&mut session).unwrap();

    let err = session.related(&users[0], "friends").unwrap_err();
    assert_eq!(err.code, ErrorCode::ExecutionFailed);
    assert_eq!(store.round_trips(), 1);
}

/// Loading behaves the same with a subscriber collecting every event.
#[test]
fn test_load_under_trace_subscriber() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let resolver = common::resolver();
        let store = common::store();
        let filter = SchemaFilter::new(&resolver, "UserListEltSchema", true).unwrap();

        let mut session = store.session();
        let users = filter
            .apply(store.query("User").unwrap())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(store.round_trips(), 2);
    });
}

/// One plan applied to two fresh queries fetches the same data at the same cost.
#[test]
fn test_applying_a_plan_twice_fetches_identical_data() {
    let resolver = common::resolver();
    let store = common::store();
    let filter = SchemaFilter::new(&resolver, "UserDetailSchema", true).unwrap();

    let first = filter.apply(store.query("User").unwrap()).unwrap();
    let second = filter.apply(store.query("User").unwrap()).unwrap();
    assert_eq!(first.eager_paths(), second.eager_paths());
    for path in filter.plan().relation_paths() {
        assert_eq!(first.options(&path), second.options(&path), "options at '{path}'");
    }

    let mut runs = Vec::new();
    for query in [&first, &second] {
        store.reset_round_trips();
        let mut session = store.session();
        let users = query.execute(&mut session).unwrap();
        let data = common::dump_all(&resolver, &mut session, filter.plan(), &users).unwrap();
        runs.push((users, data, store.round_trips()));
    }

    assert_eq!(runs[0], runs[1]);
    assert!(runs[0].2 <= 1 + filter.plan().relation_paths().len() as u64);
}
