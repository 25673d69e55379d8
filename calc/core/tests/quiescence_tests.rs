//! Handshake tests against real worker threads
//!
//! These tests spawn the actual computation threads and check the
//! guarantees the presentation side relies on:
//! - state read inside a window does not move until the window is dropped
//! - run-state changes made inside a window take effect on release
//! - suspended and exhausted computations never block a request

use std::sync::Arc;
use std::time::Duration;

use picalc_core::{
    Algorithm, ComputationPool, Confirmation, ConvergenceBand, ManualClock,
    QuiescenceCoordinator, RunState, SeriesComputation, Termination, WorkerHandle,
};

fn spawn(
    pool: &Arc<ComputationPool>,
    algorithm: Algorithm,
    termination: Termination,
) -> WorkerHandle {
    SeriesComputation::new(
        Arc::clone(pool),
        algorithm,
        termination,
        ConvergenceBand::default(),
        Arc::new(ManualClock::new()),
    )
    .unwrap()
    .spawn()
    .unwrap()
}

fn spawn_both(pool: &Arc<ComputationPool>) -> Vec<WorkerHandle> {
    Algorithm::ALL
        .into_iter()
        .map(|algorithm| spawn(pool, algorithm, Termination::Unbounded))
        .collect()
}

fn shutdown(pool: &ComputationPool, workers: Vec<WorkerHandle>) {
    pool.shutdown();
    for worker in workers {
        worker.join().unwrap();
    }
}

async fn let_workers_run() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

async fn start(coordinator: &mut QuiescenceCoordinator, algorithm: Algorithm) {
    let mut window = coordinator.acquire().await.unwrap();
    window.set_run_state(algorithm, RunState::Running);
}

#[tokio::test]
async fn test_idle_workers_never_block_acquire() {
    let pool = ComputationPool::new();
    let workers = spawn_both(&pool);
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    for _ in 0..50 {
        let window = tokio::time::timeout(Duration::from_secs(1), coordinator.acquire())
            .await
            .expect("acquire blocked with both computations suspended")
            .unwrap();
        assert_eq!(window.confirmation(), Confirmation::AllSuspended);
    }
    assert_eq!(coordinator.stats().skipped_waits, 50);

    drop(coordinator);
    shutdown(&pool, workers);
}

#[tokio::test]
async fn test_state_is_frozen_inside_window() {
    let pool = ComputationPool::new();
    let workers = spawn_both(&pool);
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    start(&mut coordinator, Algorithm::Leibniz).await;
    let_workers_run().await;

    let (frozen, iteration) = {
        let window = coordinator.acquire().await.unwrap();
        assert_eq!(window.confirmation(), Confirmation::Acknowledged);

        let before = window.accumulator(Algorithm::Leibniz).clone();
        assert!(before.series.iteration() > 0);

        // Hold the window while the worker would otherwise keep stepping.
        std::thread::sleep(Duration::from_millis(20));
        let after = window.accumulator(Algorithm::Leibniz).clone();
        assert_eq!(before, after);
        (after.approximation, after.series.iteration())
    };

    let_workers_run().await;
    let window = coordinator.acquire().await.unwrap();
    let resumed = window.accumulator(Algorithm::Leibniz);
    assert!(resumed.series.iteration() > iteration);
    assert_ne!(resumed.approximation, frozen);
    drop(window);

    drop(coordinator);
    shutdown(&pool, workers);
}

#[tokio::test]
async fn test_repeated_windows_with_both_running() {
    let pool = ComputationPool::new();
    let workers = spawn_both(&pool);
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    {
        let mut window = coordinator.acquire().await.unwrap();
        window.set_run_state(Algorithm::Leibniz, RunState::Running);
        window.set_run_state(Algorithm::Nilakantha, RunState::Running);
    }

    let mut last = [0u64; 2];
    for _ in 0..200 {
        let window = coordinator.acquire().await.unwrap();
        for algorithm in Algorithm::ALL {
            let iteration = window.accumulator(algorithm).series.iteration();
            assert!(iteration >= last[algorithm.index()]);
            last[algorithm.index()] = iteration;
        }
        drop(window);
        tokio::task::yield_now().await;
    }

    let_workers_run().await;
    {
        let window = coordinator.acquire().await.unwrap();
        for algorithm in Algorithm::ALL {
            assert!(window.accumulator(algorithm).series.iteration() > 0);
        }
    }

    let stats = coordinator.stats();
    assert_eq!(stats.windows, 202);
    assert_eq!(stats.faults, 0);

    drop(coordinator);
    shutdown(&pool, workers);
}

#[tokio::test]
async fn test_stop_takes_effect_on_release() {
    let pool = ComputationPool::new();
    let workers = spawn_both(&pool);
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    start(&mut coordinator, Algorithm::Nilakantha).await;
    let_workers_run().await;

    let stopped_at = {
        let mut window = coordinator.acquire().await.unwrap();
        window.set_run_state(Algorithm::Nilakantha, RunState::Suspended);
        window.accumulator(Algorithm::Nilakantha).series.iteration()
    };

    let_workers_run().await;
    let window = coordinator.acquire().await.unwrap();
    assert_eq!(window.confirmation(), Confirmation::AllSuspended);
    assert_eq!(
        window.accumulator(Algorithm::Nilakantha).series.iteration(),
        stopped_at
    );
    drop(window);

    drop(coordinator);
    shutdown(&pool, workers);
}

#[tokio::test]
async fn test_exhausted_computation_does_not_block() {
    let pool = ComputationPool::new();
    let workers = vec![
        spawn(&pool, Algorithm::Nilakantha, Termination::BelowEpsilon(1e-5)),
        spawn(&pool, Algorithm::Leibniz, Termination::Unbounded),
    ];
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    start(&mut coordinator, Algorithm::Nilakantha).await;
    let_workers_run().await;
    assert!(pool.slot(Algorithm::Nilakantha).is_exhausted());

    let window = tokio::time::timeout(Duration::from_secs(1), coordinator.acquire())
        .await
        .expect("exhausted computation blocked the request")
        .unwrap();
    assert_eq!(window.run_state(Algorithm::Nilakantha), RunState::Running);
    let accumulator = window.accumulator(Algorithm::Nilakantha);
    assert!(accumulator.series.is_exhausted());
    assert!(accumulator.series.next_contribution().abs() < 1e-5);
    drop(window);

    drop(coordinator);
    shutdown(&pool, workers);
}

#[tokio::test]
async fn test_reset_revives_exhausted_computation() {
    let pool = ComputationPool::new();
    let workers = vec![spawn(
        &pool,
        Algorithm::Nilakantha,
        Termination::BelowEpsilon(1e-3),
    )];
    let mut coordinator = QuiescenceCoordinator::new(Arc::clone(&pool), None).unwrap();

    start(&mut coordinator, Algorithm::Nilakantha).await;
    let_workers_run().await;

    let first_run = {
        let mut window = coordinator.acquire().await.unwrap();
        let first_run = window.accumulator(Algorithm::Nilakantha).clone();
        assert!(first_run.series.is_exhausted());

        window.set_run_state(Algorithm::Nilakantha, RunState::Suspended);
        window.reset(Algorithm::Nilakantha);
        first_run
    };
    assert!(!pool.slot(Algorithm::Nilakantha).is_exhausted());

    start(&mut coordinator, Algorithm::Nilakantha).await;
    let_workers_run().await;

    let window = coordinator.acquire().await.unwrap();
    let second_run = window.accumulator(Algorithm::Nilakantha);
    assert!(second_run.series.is_exhausted());
    assert_eq!(second_run.series.iteration(), first_run.series.iteration());
    assert_eq!(second_run.approximation, first_run.approximation);
    drop(window);

    drop(coordinator);
    shutdown(&pool, workers);
}
