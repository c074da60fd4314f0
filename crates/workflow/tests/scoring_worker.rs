mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use dealflow_core::deal::{ReleaseStatus, ScoringStatus};
use dealflow_core::error::CoreError;
use dealflow_db::models::deal::Deal;
use dealflow_events::bus::{EVENT_DEAL_SCORED, EVENT_SCORING_FAILED, EVENT_SCORING_QUEUED};
use dealflow_workflow::scoring::WORKER_STOPPED;
use dealflow_workflow::service::SCORING_INTERRUPTED;
use dealflow_workflow::{ScoringJob, ScoringOutcome, ScoringQueue, ScoringWorker, WorkflowError};
use tokio_util::sync::CancellationToken;

use common::{harness, sample_input, Harness, StubScorer, ADMIN, OWNER_ID};

fn core(err: WorkflowError) -> CoreError {
    match err {
        WorkflowError::Core(core) => core,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

fn worker(h: &Harness, scorer: StubScorer) -> ScoringWorker {
    ScoringWorker::new(h.store.clone(), h.events.clone(), Arc::new(scorer))
}

fn completed(outcome: ScoringOutcome) -> Deal {
    match outcome {
        ScoringOutcome::Completed(deal) => deal,
        other => panic!("expected a completed job, got {other:?}"),
    }
}

fn job(deal_id: i64) -> ScoringJob {
    ScoringJob {
        deal_id,
        requested_by: ADMIN.user_id,
        input: sample_input(),
    }
}

#[tokio::test]
async fn scoring_without_queue_is_a_conflict() {
    let h = harness();
    let deal = h.new_deal().await;
    let err = h
        .service
        .request_scoring(&ADMIN, deal.id, sample_input())
        .await
        .unwrap_err();
    assert_matches!(core(err), CoreError::Conflict(_));
    assert_eq!(h.store.deal(deal.id).scoring_status, ScoringStatus::NotStarted);
}

#[tokio::test]
async fn request_scoring_queues_job_once() {
    let h = harness();
    let (queue, mut rx) = ScoringQueue::channel(4);
    let service = h.service.clone().with_scoring_queue(queue);
    let deal = h.new_deal().await;

    let queued = service
        .request_scoring(&ADMIN, deal.id, sample_input())
        .await
        .unwrap();
    assert_eq!(queued.scoring_status, ScoringStatus::Queued);
    assert!(h
        .store
        .activity_actions(deal.id)
        .contains(&EVENT_SCORING_QUEUED.to_string()));

    let job = rx.try_recv().unwrap();
    assert_eq!(job.deal_id, deal.id);
    assert_eq!(job.requested_by, ADMIN.user_id);

    let err = service
        .request_scoring(&ADMIN, deal.id, sample_input())
        .await
        .unwrap_err();
    assert_matches!(core(err), CoreError::Conflict(_));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn full_queue_leaves_deal_untouched() {
    let h = harness();
    let (queue, _rx) = ScoringQueue::channel(1);
    let service = h.service.clone().with_scoring_queue(queue);
    let first = h.new_deal().await;
    let second = h.new_deal().await;

    service
        .request_scoring(&ADMIN, first.id, sample_input())
        .await
        .unwrap();
    let err = service
        .request_scoring(&ADMIN, second.id, sample_input())
        .await
        .unwrap_err();

    assert_matches!(core(err), CoreError::Conflict(_));
    assert_eq!(h.store.deal(second.id).scoring_status, ScoringStatus::NotStarted);
}

#[tokio::test]
async fn empty_loan_tape_is_rejected() {
    let h = harness();
    let (queue, _rx) = ScoringQueue::channel(1);
    let service = h.service.clone().with_scoring_queue(queue);
    let deal = h.new_deal().await;
    let mut input = sample_input();
    input.loan_tape.clear();

    let err = service
        .request_scoring(&ADMIN, deal.id, input)
        .await
        .unwrap_err();
    assert_matches!(core(err), CoreError::Validation(_));
}

#[tokio::test]
async fn eligible_score_makes_deal_ready_for_release() {
    let h = harness();
    let deal = h.new_deal().await;

    let outcome = worker(&h, StubScorer::eligible(82.0, "B+"))
        .process(job(deal.id))
        .await;

    let scored = completed(outcome);
    assert_eq!(scored.score, Some(82.0));
    assert_eq!(scored.grade.as_deref(), Some("B+"));
    assert_eq!(scored.scoring_status, ScoringStatus::Completed);
    assert_eq!(scored.release_status, ReleaseStatus::ReadyForRelease);
    assert!(scored.scored_at.is_some());
    assert!(h
        .store
        .activity_actions(deal.id)
        .contains(&EVENT_DEAL_SCORED.to_string()));
    assert!(h.store.notifications().iter().any(|n| n.user_id == OWNER_ID));
}

#[tokio::test]
async fn ineligible_score_rejects_deal() {
    let h = harness();
    let deal = h.new_deal().await;

    let outcome = worker(&h, StubScorer::ineligible(31.0, "D"))
        .process(job(deal.id))
        .await;

    let scored = completed(outcome);
    assert_eq!(scored.release_status, ReleaseStatus::Rejected);
    assert!(scored.has_score());
}

#[tokio::test]
async fn rescoring_keeps_released_status() {
    let h = harness();
    let partner = h.store.add_partner("optima", true);
    let deal = h.scored_deal(82.0).await;
    h.service
        .release_deal(&ADMIN, deal.id, partner.id, None)
        .await
        .unwrap();

    let outcome = worker(&h, StubScorer::ineligible(40.0, "D"))
        .process(job(deal.id))
        .await;

    let scored = completed(outcome);
    assert_eq!(scored.release_status, ReleaseStatus::Released);
    assert_eq!(scored.score, Some(40.0));
}

#[tokio::test]
async fn scorer_failure_is_recorded_not_retried() {
    let h = harness();
    let mut events = h.events.subscribe();
    let deal = h.new_deal().await;

    let outcome = worker(&h, StubScorer::Fails).process(job(deal.id)).await;

    assert_matches!(outcome, ScoringOutcome::Failed { deal_id, .. } if deal_id == deal.id);
    let failed = h.store.deal(deal.id);
    assert_eq!(failed.scoring_status, ScoringStatus::Failed);
    assert!(failed.scoring_error.as_deref().unwrap().contains("503"));
    assert!(!failed.has_score());
    assert_eq!(failed.release_status, ReleaseStatus::Pending);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event.event_type);
    }
    assert!(seen.contains(&EVENT_SCORING_FAILED.to_string()));
}

#[tokio::test]
async fn out_of_range_assessment_fails_job() {
    let h = harness();
    let deal = h.new_deal().await;

    let outcome = worker(&h, StubScorer::eligible(140.0, "A+"))
        .process(job(deal.id))
        .await;

    assert_matches!(outcome, ScoringOutcome::Failed { .. });
    assert!(!h.store.deal(deal.id).has_score());
}

#[tokio::test]
async fn job_for_missing_deal_is_skipped() {
    let h = harness();
    let outcome = worker(&h, StubScorer::eligible(82.0, "B+"))
        .process(job(4_040))
        .await;
    assert_matches!(outcome, ScoringOutcome::Skipped { deal_id: 4_040 });
}

#[tokio::test]
async fn worker_drains_queue_until_cancelled() {
    let h = harness();
    let (queue, rx) = ScoringQueue::channel(4);
    let service = h.service.clone().with_scoring_queue(queue);
    let deal = h.new_deal().await;
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker(&h, StubScorer::eligible(75.0, "B")).run(rx, cancel.clone()));

    service
        .request_scoring(&ADMIN, deal.id, sample_input())
        .await
        .unwrap();

    let mut status = ScoringStatus::Queued;
    for _ in 0..200 {
        status = h.store.deal(deal.id).scoring_status;
        if status == ScoringStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status, ScoringStatus::Completed);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn failed_score_write_marks_deal_failed() {
    let h = harness();
    let (queue, _rx) = ScoringQueue::channel(4);
    let service = h.service.clone().with_scoring_queue(queue);
    let deal = h.new_deal().await;
    h.store.fail_next("record_score");

    let outcome = worker(&h, StubScorer::eligible(82.0, "B+"))
        .process(job(deal.id))
        .await;

    assert_matches!(outcome, ScoringOutcome::Failed { deal_id, .. } if deal_id == deal.id);
    let failed = h.store.deal(deal.id);
    assert_eq!(failed.scoring_status, ScoringStatus::Failed);
    assert!(failed.scoring_error.as_deref().unwrap().starts_with("Failed to record score"));
    assert!(!failed.has_score());
    assert!(h
        .store
        .activity_actions(deal.id)
        .contains(&EVENT_SCORING_FAILED.to_string()));

    let requeued = service
        .request_scoring(&ADMIN, deal.id, sample_input())
        .await
        .unwrap();
    assert_eq!(requeued.scoring_status, ScoringStatus::Queued);
}

#[tokio::test]
async fn failed_processing_write_marks_deal_failed() {
    let h = harness();
    let deal = h.new_deal().await;
    h.store.fail_next("update_scoring_status:processing");

    let outcome = worker(&h, StubScorer::eligible(82.0, "B+"))
        .process(job(deal.id))
        .await;

    assert_matches!(outcome, ScoringOutcome::Failed { .. });
    let failed = h.store.deal(deal.id);
    assert_eq!(failed.scoring_status, ScoringStatus::Failed);
    assert!(failed.scoring_error.as_deref().unwrap().starts_with("Failed to start scoring"));
    assert!(!failed.has_score());
}

#[tokio::test]
async fn failed_deal_load_marks_deal_failed() {
    let h = harness();
    let deal = h.new_deal().await;
    h.store.fail_next("find_deal");

    let outcome = worker(&h, StubScorer::eligible(82.0, "B+"))
        .process(job(deal.id))
        .await;

    assert_matches!(outcome, ScoringOutcome::Failed { .. });
    assert_eq!(h.store.deal(deal.id).scoring_status, ScoringStatus::Failed);
}

#[tokio::test]
async fn cancelled_worker_fails_buffered_jobs() {
    let h = harness();
    let (queue, rx) = ScoringQueue::channel(4);
    let service = h.service.clone().with_scoring_queue(queue);
    let first = h.new_deal().await;
    let second = h.new_deal().await;
    for deal in [&first, &second] {
        service
            .request_scoring(&ADMIN, deal.id, sample_input())
            .await
            .unwrap();
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    tokio::time::timeout(
        Duration::from_secs(1),
        worker(&h, StubScorer::eligible(75.0, "B")).run(rx, cancel),
    )
    .await
    .expect("worker should stop after cancellation");

    for deal in [&first, &second] {
        let stopped = h.store.deal(deal.id);
        assert_eq!(stopped.scoring_status, ScoringStatus::Failed);
        assert_eq!(stopped.scoring_error.as_deref(), Some(WORKER_STOPPED));
        assert!(!stopped.has_score());
    }

    let err = service
        .request_scoring(&ADMIN, first.id, sample_input())
        .await
        .unwrap_err();
    assert_matches!(core(err), CoreError::Conflict(msg) if msg.contains("not running"));
}

#[tokio::test]
async fn startup_fails_interrupted_scoring() {
    let h = harness();
    let queued = h.new_deal().await;
    let processing = h.new_deal().await;
    let scored = h.scored_deal(82.0).await;
    h.store.set_scoring_status(queued.id, ScoringStatus::Queued);
    h.store.set_scoring_status(processing.id, ScoringStatus::Processing);

    let mut reset = h.service.recover_interrupted_scoring().await.unwrap();
    reset.sort_unstable();

    assert_eq!(reset, vec![queued.id, processing.id]);
    for id in reset {
        let deal = h.store.deal(id);
        assert_eq!(deal.scoring_status, ScoringStatus::Failed);
        assert_eq!(deal.scoring_error.as_deref(), Some(SCORING_INTERRUPTED));
        assert!(h
            .store
            .activity_actions(id)
            .contains(&EVENT_SCORING_FAILED.to_string()));
    }
    assert_eq!(h.store.deal(scored.id).scoring_status, ScoringStatus::Completed);
    assert!(h.service.recover_interrupted_scoring().await.unwrap().is_empty());
}
