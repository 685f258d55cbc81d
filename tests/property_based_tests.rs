mod common;

use std::sync::Arc;

use common::strategies::*;
use proptest::prelude::*;
use provisioning_core::config::TaskConfig;
use provisioning_core::database::InMemoryTaskStore;
use provisioning_core::models::NewTask;
use provisioning_core::orchestration::{IgnoreReason, StatusUpdate};
use provisioning_core::{TaskStatus, TaskTracker};

const WORKER: Option<&str> = Some("property-worker");

fn tracker() -> TaskTracker {
    TaskTracker::new(Arc::new(InMemoryTaskStore::new()), &TaskConfig::default())
}

proptest! {
    /// Property: recorded progress never decreases, whatever order reports arrive in
    #[test]
    fn progress_is_monotonic(reports in progress_reports_strategy()) {
        tokio_test::block_on(async {
            let tracker = tracker();
            let task = tracker.create_task(NewTask::default()).await.unwrap();
            let mut last_progress = 0u8;
            let mut highest = 0u8;

            for report in reports {
                highest = highest.max(u8::try_from(report.progress).unwrap());
                let outcome = tracker
                    .update_task_status(&task.task_id, report, WORKER)
                    .await
                    .unwrap();
                let current = outcome.task();
                prop_assert!(current.progress >= last_progress);
                prop_assert_eq!(current.status, TaskStatus::Processing);
                last_progress = current.progress;
            }

            let stored = tracker.get_task(&task.task_id).await.unwrap();
            prop_assert_eq!(stored.progress, highest);
            Ok(())
        })?;
    }

    /// Property: once terminal, no callback changes the task
    #[test]
    fn terminal_tasks_are_frozen(
        fail_first in any::<bool>(),
        late in prop::collection::vec(late_callback_strategy(), 1..10),
    ) {
        tokio_test::block_on(async {
            let tracker = tracker();
            let task = tracker.create_task(NewTask::default()).await.unwrap();
            tracker
                .update_task_status(&task.task_id, StatusUpdate::processing(25, None), WORKER)
                .await
                .unwrap();
            let terminal = if fail_first {
                tracker.mark_task_failed(&task.task_id, "boom", WORKER).await
            } else {
                tracker.mark_task_completed(&task.task_id, WORKER).await
            }
            .unwrap()
            .into_task();

            for callback in late {
                let outcome = match callback {
                    LateCallback::Progress(p) => tracker
                        .update_task_status(&task.task_id, StatusUpdate::processing(p, None), WORKER)
                        .await,
                    LateCallback::Step(step) => {
                        tracker.add_completed_step(&task.task_id, &step, WORKER).await
                    }
                    LateCallback::Complete => tracker.mark_task_completed(&task.task_id, WORKER).await,
                    LateCallback::Fail(message) => {
                        tracker
                            .mark_task_failed(&task.task_id, &format!("late {message}"), WORKER)
                            .await
                    }
                }
                .unwrap();
                prop_assert_eq!(outcome.ignore_reason(), Some(IgnoreReason::TerminalState));
            }

            let stored = tracker.get_task(&task.task_id).await.unwrap();
            prop_assert_eq!(stored, terminal);
            Ok(())
        })?;
    }

    /// Property: retry count never exceeds the budget
    #[test]
    fn retries_stay_within_budget(max_retries in 0u32..6, attempts in 0usize..10) {
        tokio_test::block_on(async {
            let tracker = tracker();
            let task = tracker
                .create_task(NewTask::default().with_max_retries(max_retries))
                .await
                .unwrap();

            for _ in 0..attempts {
                tracker.mark_task_failed(&task.task_id, "transient", None).await.unwrap();
                let _ = tracker
                    .retry_task(&task.task_id, provisioning_core::models::CorrelationId::generate())
                    .await;
            }

            let stored = tracker.get_task(&task.task_id).await.unwrap();
            prop_assert!(stored.retry_count <= stored.max_retries);
            prop_assert_eq!(stored.retry_count, max_retries.min(attempts as u32));
            Ok(())
        })?;
    }
}
