use proptest::prelude::*;
use tps_core::models::InstanceState;

/// Strategy for lifecycle states of observed records
pub fn instance_state_strategy() -> impl Strategy<Value = InstanceState> {
    prop_oneof![
        Just(InstanceState::Starting),
        Just(InstanceState::Running),
        Just(InstanceState::Crashed),
        Just(InstanceState::Unknown),
    ]
}

/// Declared instance count plus, per index, the state of its observed record if any.
///
/// Extra observed records beyond the declared count are included to exercise range filtering.
pub fn declared_and_observed_strategy(
) -> impl Strategy<Value = (u32, Vec<Option<InstanceState>>)> {
    (0u32..16).prop_flat_map(|declared| {
        (
            Just(declared),
            prop::collection::vec(
                prop::option::of(instance_state_strategy()),
                0..(declared as usize + 4),
            ),
        )
    })
}
