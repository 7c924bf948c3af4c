mod common;

use std::time::Duration;

use common::{date, harness_at, harness_with_store, noon, scenario_a, FlakyStore};
use plan_core::{
    core::PlanStore,
    domain::{BreakdownEdit, PlanParameters, PlanWithBreakdowns},
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn edits_to_different_plans_do_not_interfere() {
    let harness = harness_at(noon(date(2024, 1, 5)));
    let first = harness.coordinator.create_plan(scenario_a()).await.unwrap();
    let second = harness
        .coordinator
        .create_plan(PlanParameters::new("Car", date(2024, 1, 1), 3, 2000.0, 500.0))
        .await
        .unwrap();

    let left_edit = BreakdownEdit::net_amount(1000.0);
    let right_edit = BreakdownEdit::net_amount(0.0);
    let (left, right) = tokio::join!(
        harness
            .coordinator
            .edit_breakdown(first.plan.id, 0, &left_edit),
        harness
            .coordinator
            .edit_breakdown(second.plan.id, 1, &right_edit),
    );

    let left: Vec<f64> = left.unwrap().breakdowns.iter().map(|m| m.cumulative_net).collect();
    let right: Vec<f64> = right.unwrap().breakdowns.iter().map(|m| m.cumulative_net).collect();
    assert_eq!(left, vec![1000.0, 5000.0, 9000.0]);
    assert_eq!(right, vec![1500.0, 1500.0, 3000.0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_edits_to_one_plan_leave_a_consistent_chain() {
    let harness = harness_at(noon(date(2024, 1, 5)));
    let created = harness.coordinator.create_plan(scenario_a()).await.unwrap();
    let plan_id = created.plan.id;

    let early_edit = BreakdownEdit::net_amount(3000.0);
    let late_edit = BreakdownEdit::net_amount(2000.0);
    let (early, late) = tokio::join!(
        harness
            .coordinator
            .edit_breakdown(plan_id, 0, &early_edit),
        harness
            .coordinator
            .edit_breakdown(plan_id, 1, &late_edit),
    );
    early.unwrap();
    late.unwrap();

    let stored = harness.store.fetch_breakdowns(plan_id).await.unwrap();
    let cumulative: Vec<f64> = stored.iter().map(|m| m.cumulative_net).collect();
    assert_eq!(cumulative, vec![3000.0, 5000.0, 9000.0]);
    assert!(PlanWithBreakdowns::new(created.plan, stored)
        .verify_chain()
        .is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_edit_still_finishes_its_walk() {
    let harness = harness_at(noon(date(2024, 1, 5)));
    let created = harness.coordinator.create_plan(scenario_a()).await.unwrap();
    let plan_id = created.plan.id;

    let mut edited = created.breakdowns[0].clone();
    edited.apply_edit(&BreakdownEdit::net_amount(0.0)).unwrap();
    let _ = tokio::time::timeout(
        Duration::ZERO,
        harness.coordinator.update_breakdown(edited),
    )
    .await;

    let mut settled = false;
    for _ in 0..200 {
        let stored = harness.store.fetch_breakdowns(plan_id).await.unwrap();
        if stored[2].cumulative_net == 8000.0 {
            assert!(PlanWithBreakdowns::new(created.plan.clone(), stored)
                .verify_chain()
                .is_ok());
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(settled, "detached recalculation never completed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn partial_edits_to_one_month_are_both_kept() {
    let harness = harness_at(noon(date(2024, 1, 5)));
    let created = harness.coordinator.create_plan(scenario_a()).await.unwrap();
    let plan_id = created.plan.id;
    let fixed = BreakdownEdit {
        fixed_expenses: Some(1000.0),
        ..BreakdownEdit::default()
    };
    let income = BreakdownEdit {
        projected_income: Some(20_000.0),
        ..BreakdownEdit::default()
    };

    let (left, right) = tokio::join!(
        harness.coordinator.edit_breakdown(plan_id, 1, &fixed),
        harness.coordinator.edit_breakdown(plan_id, 1, &income),
    );
    left.unwrap();
    right.unwrap();

    let stored = harness.store.fetch_breakdowns(plan_id).await.unwrap();
    let month = &stored[1];
    assert_eq!(month.projected_income, 20_000.0);
    assert_eq!(month.fixed_expenses, 1000.0);
    assert_eq!(month.total_projected_expenses, 7000.0);
    assert_eq!(month.net_amount, 13_000.0);
    assert_eq!(stored[2].cumulative_net, 21_000.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn selection_waits_for_a_running_walk() {
    let harness = harness_with_store(FlakyStore::new(), noon(date(2024, 1, 5)));
    let created = harness.coordinator.create_plan(scenario_a()).await.unwrap();
    let plan_id = created.plan.id;
    harness.store.slow_writes(Duration::from_millis(20));

    let edit = BreakdownEdit::net_amount(3000.0);
    let (edited, selected) = tokio::join!(
        harness
            .coordinator
            .edit_breakdown(plan_id, 0, &edit),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            harness.coordinator.select_plan(plan_id).await
        },
    );
    edited.unwrap();
    let selection = selected.unwrap();

    assert!(selection.plan.verify_chain().is_ok());
    let cumulative: Vec<f64> = selection
        .plan
        .breakdowns
        .iter()
        .map(|m| m.cumulative_net)
        .collect();
    assert_eq!(cumulative, vec![3000.0, 7000.0, 11000.0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn plans_being_created_are_never_listed_without_months() {
    let harness = harness_with_store(FlakyStore::new(), noon(date(2024, 1, 5)));
    harness.store.slow_writes(Duration::from_millis(30));

    let (created, seen) = tokio::join!(harness.coordinator.create_plan(scenario_a()), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut lengths = Vec::new();
        for plan in harness.coordinator.load_plans().await.unwrap() {
            let selection = harness.coordinator.select_plan(plan.id).await.unwrap();
            lengths.push(selection.plan.breakdowns.len());
        }
        lengths
    });

    let created = created.unwrap();
    assert!(seen.iter().all(|&months| months == 3), "partial plan seen: {seen:?}");
    let selection = harness.coordinator.select_plan(created.plan.id).await.unwrap();
    assert_eq!(selection.plan.breakdowns.len(), 3);
}
