use proptest::prelude::*;

use provisioning_core::orchestration::StatusUpdate;

/// Steps a provisioning worker might report
pub fn step_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("create_schema".to_string()),
        Just("seed_data".to_string()),
        Just("configure_dns".to_string()),
        Just("issue_certificate".to_string()),
        "[a-z][a-z_]{2,24}",
    ]
}

/// Processing reports in arbitrary (possibly regressive, possibly repeated) order
pub fn progress_reports_strategy() -> impl Strategy<Value = Vec<StatusUpdate>> {
    prop::collection::vec(
        (0u8..=100, prop::option::of(step_name_strategy())),
        1..20,
    )
    .prop_map(|reports| {
        reports
            .into_iter()
            .map(|(progress, step)| StatusUpdate::processing(progress, step.as_deref()))
            .collect()
    })
}

/// Callback kinds a worker may deliver after a task went terminal
#[derive(Debug, Clone)]
pub enum LateCallback {
    Progress(u8),
    Step(String),
    Complete,
    Fail(String),
}

pub fn late_callback_strategy() -> impl Strategy<Value = LateCallback> {
    prop_oneof![
        (0u8..=100).prop_map(LateCallback::Progress),
        step_name_strategy().prop_map(LateCallback::Step),
        Just(LateCallback::Complete),
        "[a-z ]{1,30}".prop_map(LateCallback::Fail),
    ]
}
