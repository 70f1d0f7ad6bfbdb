use std::sync::Arc;
use std::time::{Duration, Instant};

use serial_test::serial;

use cyclescan::{
    test_helper::{permutation_with_cycle_lengths, PanicOnWorker, StallOnWorker},
    AnalysisError, Config, Execution, Mode, ParallelFailure, PoolManager, Supervisor,
};

fn reference(lengths: &[u64]) -> Vec<(cyclescan::CanonicalKey, u64)> {
    Supervisor::new(Config::from_workers(1))
        .analyze_sequential(Arc::new(permutation_with_cycle_lengths(lengths)))
        .unwrap()
        .signature()
}

#[test]
#[serial]
fn test_worker_panic_falls_back() {
    let lengths = [1, 1, 2, 4, 8];
    for mode in [Mode::Static, Mode::Dynamic] {
        let oracle = PanicOnWorker(permutation_with_cycle_lengths(&lengths));
        let supervisor = Supervisor::new(Config::from_workers(2).with_mode(mode).with_batch_size(4));
        let result = supervisor.analyze(Arc::new(oracle)).unwrap();
        match &result.stats.execution {
            Execution::Fallback {
                mode: failed_mode,
                reason,
            } => {
                assert_eq!(*failed_mode, mode);
                assert!(matches!(reason, ParallelFailure::WorkerPanicOrCrash { .. }));
            }
            other => panic!("expected a fallback, got {:?}", other),
        }
        assert_eq!(result.signature(), reference(&lengths));
        assert_eq!(result.stats.workers, 1);
    }
}

#[test]
#[serial]
fn test_global_timeout_falls_back() {
    let lengths = [64];
    let oracle = StallOnWorker {
        inner: permutation_with_cycle_lengths(&lengths),
        delay: Duration::from_millis(10),
    };
    let config = Config::from_workers(2)
        .with_mode(Mode::Static)
        .with_global_timeout(Duration::from_millis(100));
    let supervisor = Supervisor::new(config);
    let result = supervisor.analyze(Arc::new(oracle)).unwrap();
    assert!(matches!(
        result.stats.execution,
        Execution::Fallback {
            reason: ParallelFailure::GlobalTimeout { .. },
            ..
        }
    ));
    assert_eq!(result.signature(), reference(&lengths));
}

#[test]
#[serial]
fn test_no_fallback_reports_failure() {
    let oracle = PanicOnWorker(permutation_with_cycle_lengths(&[3, 5]));
    let config = Config::from_workers(2).with_mode(Mode::Dynamic).with_fallback(false);
    let err = Supervisor::new(config).analyze(Arc::new(oracle)).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::ParallelFailed(ParallelFailure::WorkerPanicOrCrash { .. })
    ));
}

#[test]
#[serial]
fn test_pool_survives_a_failed_run() {
    let supervisor = Supervisor::new(Config::from_workers(2).with_mode(Mode::Static));
    let oracle = PanicOnWorker(permutation_with_cycle_lengths(&[2, 2]));
    supervisor.analyze(Arc::new(oracle)).unwrap();

    let result = supervisor
        .analyze(Arc::new(permutation_with_cycle_lengths(&[2, 3, 4])))
        .unwrap();
    assert_eq!(result.stats.execution, Execution::Parallel { mode: Mode::Static });
    assert_eq!(result.periods(), vec![2, 3, 4]);
    // the failed run's pool was abandoned
    assert_eq!(supervisor.pool().creations(), 2);
}

#[test]
#[serial]
fn test_stalled_workers_do_not_hold_the_next_run() {
    let pool = Arc::new(PoolManager::new(1));
    let config = Config::from_workers(1)
        .with_mode(Mode::Static)
        .with_global_timeout(Duration::from_millis(300));
    let supervisor = Supervisor::with_pool(config, pool.clone());

    let stalled = StallOnWorker {
        inner: permutation_with_cycle_lengths(&[8]),
        delay: Duration::from_secs(2),
    };
    let result = supervisor.analyze(Arc::new(stalled)).unwrap();
    assert!(matches!(
        result.stats.execution,
        Execution::Fallback {
            reason: ParallelFailure::GlobalTimeout { .. },
            ..
        }
    ));
    assert_eq!(result.periods(), vec![8]);

    // the only pool thread is still asleep in the stalled oracle
    let result = supervisor
        .analyze(Arc::new(permutation_with_cycle_lengths(&[1, 2, 5])))
        .unwrap();
    assert_eq!(result.stats.execution, Execution::Parallel { mode: Mode::Static });
    assert_eq!(result.periods(), vec![1, 2, 5]);
    assert_eq!(pool.creations(), 2);

    let started = Instant::now();
    supervisor.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
}
