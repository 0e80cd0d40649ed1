//! Executor mode and fallback mode must produce identical results.

mod common;

use std::sync::LazyLock;
use std::time::Duration;

use estate_offload::{
    CoordinatorBuilder, DispatchCoordinator, FilterSpec, Isolation, OffloadError, Operation,
    OperationOutput, PriceRange, PropertyRecord, SortKey, SortOrder, outcome_pair,
};
use proptest::prelude::*;
use serde_json::{Value, json};

static EXECUTOR: LazyLock<DispatchCoordinator> = LazyLock::new(|| {
    common::init_tracing();
    CoordinatorBuilder::new().thread_name("equivalence-executor").build()
});

static FALLBACK: LazyLock<DispatchCoordinator> =
    LazyLock::new(|| CoordinatorBuilder::new().isolation(Isolation::Unavailable).build());

/// Run `operation` through the coordinator's public API and wait for it.
fn run_on(coordinator: &DispatchCoordinator, operation: Operation) -> Result<OperationOutput, OffloadError> {
    let (sender, receiver) = outcome_pair();
    let send_properties = move |records: Vec<PropertyRecord>, error: Option<OffloadError>| {
        sender.send(match error {
            Some(err) => Err(err),
            None => Ok(OperationOutput::Properties(records)),
        });
    };

    match operation {
        Operation::Filter { properties, filters } => {
            coordinator.filter_properties(properties, filters, send_properties);
        }
        Operation::Search { properties, query } => {
            coordinator.search_properties(properties, query, send_properties);
        }
        Operation::Sort {
            properties,
            sort_by,
            sort_order,
        } => {
            coordinator.sort_properties(properties, sort_by, sort_order, send_properties);
        }
        Operation::Stats { properties } => {
            let (stats_tx, stats_rx) = outcome_pair();
            coordinator.calculate_stats(properties, move |result| stats_tx.send(result));
            assert!(coordinator.wait_idle(Duration::from_secs(5)));
            return stats_rx
                .try_take()
                .expect("stats callback fired")
                .map(OperationOutput::Stats);
        }
    }

    assert!(coordinator.wait_idle(Duration::from_secs(5)));
    receiver.try_take().expect("callback fired")
}

fn price_value() -> impl Strategy<Value = Value> + Clone {
    prop_oneof![
        (0u32..5000).prop_map(|p| json!(p)),
        (-5000i32..0).prop_map(|p| json!(p)),
        (0u32..5000).prop_map(|p| json!(format!("{p}"))),
        (0.0f64..5000.0).prop_map(|p| json!(p)),
        (0u32..5000).prop_map(|p| json!(format!("{p} per month"))),
        prop::sample::select(vec!["1e3", "-2.5e2", "1e400", "-1e400", "7e-3 each"])
            .prop_map(|p| json!(p)),
        prop::sample::select(vec![f64::MAX, -f64::MAX, 1e308, f64::MIN_POSITIVE])
            .prop_map(|p| json!(p)),
        Just(json!("call for price")),
        Just(json!(true)),
        Just(Value::Null),
    ]
}

fn listing() -> impl Strategy<Value = PropertyRecord> + Clone {
    (
        any::<u32>(),
        price_value(),
        "[a-cA-C ]{0,8}",
        "[a-c ]{0,8}",
        proptest::option::of(prop::sample::select(vec!["house", "apartment", "land"])),
    )
        .prop_map(|(id, price, title, address, property_type)| {
            let record = PropertyRecord::new()
                .with("id", id)
                .with("price", price)
                .with("title", title)
                .with("address", address);
            match property_type {
                Some(property_type) => record.with("property_type", property_type),
                None => record,
            }
        })
}

fn bound() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => -5000.0f64..5000.0,
        1 => prop::sample::select(vec![
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
            f64::MAX,
            -f64::MAX,
        ]),
    ]
}

fn filter_spec() -> impl Strategy<Value = FilterSpec> {
    (
        proptest::option::of((proptest::option::of(bound()), proptest::option::of(bound()))),
        prop::sample::select(vec!["all", "house", "apartment", "castle"]),
    )
        .prop_map(|(range, property_type)| {
            let spec = FilterSpec::new().with_property_type(property_type);
            match range {
                Some((min, max)) => spec.with_price_range(PriceRange { min, max }),
                None => spec,
            }
        })
}

fn operation() -> impl Strategy<Value = Operation> {
    let properties = prop::collection::vec(listing(), 0..25);
    prop_oneof![
        (properties.clone(), filter_spec())
            .prop_map(|(properties, filters)| Operation::Filter { properties, filters }),
        (properties.clone(), "[a-cA-C ]{0,3}")
            .prop_map(|(properties, query)| Operation::Search { properties, query }),
        (
            properties.clone(),
            prop::sample::select(vec!["price", "title", "bedrooms"]),
            prop::sample::select(vec!["asc", "desc", "sideways"]),
        )
            .prop_map(|(properties, key, order)| Operation::Sort {
                properties,
                sort_by: SortKey::from(key),
                sort_order: SortOrder::from(order.to_string()),
            }),
        properties.prop_map(|properties| Operation::Stats { properties }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn executor_matches_fallback(operation in operation()) {
        let expected = operation.run();
        let on_executor = run_on(&EXECUTOR, operation.clone());
        let on_fallback = run_on(&FALLBACK, operation);

        prop_assert!(EXECUTOR.is_ready());
        prop_assert_eq!(on_executor, Ok(expected.clone()));
        prop_assert_eq!(on_fallback, Ok(expected));
    }
}
