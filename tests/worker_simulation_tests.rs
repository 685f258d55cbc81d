//! Simulated workers consuming from the in-memory bus and reporting back
//! through the orchestrator, including at-least-once redelivery.

mod common;

use std::time::Duration;

use tokio::time::timeout;

use common::{provision_request, TestHarness};
use provisioning_core::messaging::{ProvisioningTaskMessage, Subscription};
use provisioning_core::models::{DeploymentStatus, TaskType};
use provisioning_core::orchestration::StatusUpdate;
use provisioning_core::{ProvisioningOrchestrator, TaskStatus};

const STEPS: [&str; 3] = ["create_schema", "seed_data", "configure_dns"];

/// Work one message to completion; a redelivered message replays every callback
async fn work(
    orchestrator: &ProvisioningOrchestrator,
    token: &str,
    message: &ProvisioningTaskMessage,
    deliveries: usize,
) {
    let claims = orchestrator.authenticate(token).unwrap();
    for _ in 0..deliveries {
        for (i, step) in STEPS.iter().enumerate() {
            let progress = u8::try_from((i + 1) * 30).unwrap();
            orchestrator
                .update_task_status(
                    &claims,
                    &message.task_id,
                    StatusUpdate::processing(progress, Some(step)),
                )
                .await
                .unwrap();
            orchestrator
                .add_completed_step(&claims, &message.task_id, step)
                .await
                .unwrap();
        }
        orchestrator
            .mark_task_completed(&claims, &message.task_id)
            .await
            .unwrap();
    }
}

async fn drain(
    orchestrator: ProvisioningOrchestrator,
    token: String,
    mut subscription: Subscription,
    expected: usize,
) -> usize {
    let mut handled = 0;
    while handled < expected {
        match timeout(Duration::from_secs(2), subscription.recv()).await {
            Ok(Some(delivery)) => {
                work(&orchestrator, &token, &delivery.message, 1).await;
                handled += 1;
            }
            _ => break,
        }
    }
    handled
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_group_workers_complete_all_tasks() {
    let h = TestHarness::with_auth();
    let subject = TaskType::TenantProvision.subject();
    let first = h.bus.subscribe(subject, "provisioning-workers").unwrap();
    let second = h.bus.subscribe(subject, "provisioning-workers").unwrap();

    let instances: Vec<_> = (0..6).map(|_| h.instance(DeploymentStatus::Pending)).collect();
    let mut task_ids = Vec::new();
    for instance in &instances {
        let created = h
            .orchestrator
            .provision_tenant(provision_request(instance))
            .await
            .unwrap();
        task_ids.push(created.task_id);
    }

    let workers = [
        tokio::spawn(drain(
            h.orchestrator.clone(),
            h.provisioning_worker_token(),
            first,
            3,
        )),
        tokio::spawn(drain(
            h.orchestrator.clone(),
            h.provisioning_worker_token(),
            second,
            3,
        )),
    ];
    let mut handled = 0;
    for worker in workers {
        let count = worker.await.unwrap();
        assert_eq!(count, 3, "round-robin should split the group evenly");
        handled += count;
    }
    assert_eq!(handled, 6);

    for task_id in &task_ids {
        let task = h.orchestrator.get_task_status(task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.steps_completed, STEPS);
    }
    for instance in &instances {
        assert_eq!(h.instance_status(instance).await, DeploymentStatus::Active);
    }
}

#[tokio::test]
async fn test_redelivered_message_is_harmless() {
    let h = TestHarness::with_auth();
    let mut subscription = h
        .bus
        .subscribe(TaskType::TenantProvision.subject(), "provisioning-workers")
        .unwrap();
    let instance = h.instance(DeploymentStatus::Pending);
    let created = h
        .orchestrator
        .provision_tenant(provision_request(&instance))
        .await
        .unwrap();

    let delivery = subscription.try_recv().expect("message was published");
    work(&h.orchestrator, &h.provisioning_worker_token(), &delivery.message, 2).await;

    let task = h.orchestrator.get_task_status(&created.task_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.steps_completed, STEPS);
    let history = h.orchestrator.task_history(&created.task_id).await.unwrap();
    assert_eq!(history.len(), 2);
}
