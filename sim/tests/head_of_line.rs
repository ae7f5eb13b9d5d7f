//! End-to-end runs against the real clock.

use sim::{PlannedTask, RunOutcome, Simulation};
use stats::{millis, AggregateReport};
use std::time::Duration;
use workload::{PolicyKind, RunConfig, TaskClass, WorkloadConfig};

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn plan(interval: Duration, durations: &[u64]) -> Vec<PlannedTask> {
    durations
        .iter()
        .enumerate()
        .map(|(i, &d)| PlannedTask {
            id: i as u64,
            duration: ms(d),
            offset: interval * i as u32,
        })
        .collect()
}

fn mean_response(report: &AggregateReport, class: TaskClass) -> Duration {
    report.class(class).expect("class present").response.mean
}

#[test]
fn all_short_workload_never_queues() {
    let workload = WorkloadConfig {
        num_tasks: 10,
        short_task_duration_ms: 100,
        long_task_duration_ms: 1000,
        short_task_probability: 1.0,
        target_utilization: 1.0,
    };
    assert_eq!(workload.inter_arrival_interval(), ms(100));

    let config = RunConfig::new(workload, PolicyKind::Fcfs).unwrap();
    let outcome = Simulation::new(config).run().unwrap();

    assert_eq!(outcome.tasks.len(), 10);
    assert!(outcome.max_queue_depth <= 1, "depth {}", outcome.max_queue_depth);

    for t in &outcome.tasks {
        assert_eq!(t.duration, ms(100));
        assert!(t.arrival_time <= t.dequeue_time && t.dequeue_time <= t.completion_time);
        assert!(t.service_time() >= ms(100));
        assert!(t.service_time() < ms(140), "task {} took {:?}", t.id, t.service_time());
    }

    let report = outcome.report(&workload).unwrap();
    assert_eq!(report.overall.count(), 10);
    assert_eq!(report.class(TaskClass::Short).map(|c| c.count()), Some(10));
    assert!(report.long.is_none());

    let mean = report.overall.response.mean;
    assert!(mean >= ms(100) && mean < ms(150), "mean response {:?}", mean);
}

fn hol_config(policy: PolicyKind) -> RunConfig {
    let workload = WorkloadConfig {
        num_tasks: 9,
        short_task_duration_ms: 20,
        long_task_duration_ms: 200,
        short_task_probability: 0.5,
        target_utilization: 1.0,
    };
    RunConfig::new(workload, policy).unwrap()
}

fn run_hol(policy: PolicyKind) -> (RunOutcome, AggregateReport) {
    // A long task at the head, then shorts piling up behind it; a second long
    // task sits in the middle of the backlog.
    let tasks = plan(ms(40), &[200, 20, 20, 20, 200, 20, 20, 20, 20]);
    let config = hol_config(policy);
    let outcome = Simulation::new(config).run_plan(tasks).unwrap();
    let report = outcome.report(&config.workload).unwrap();
    (outcome, report)
}

#[test]
fn sjf_relieves_head_of_line_blocking() {
    let (fcfs, fcfs_report) = run_hol(PolicyKind::Fcfs);
    let (sjf, sjf_report) = run_hol(PolicyKind::Sjf);

    for outcome in [&fcfs, &sjf] {
        assert_eq!(outcome.tasks.len(), 9);
        for t in &outcome.tasks {
            assert!(t.arrival_time <= t.dequeue_time && t.dequeue_time <= t.completion_time);
            assert!(t.service_time() >= t.duration);
        }
    }
    for report in [&fcfs_report, &sjf_report] {
        let per_class: usize = report.classes().map(|c| c.count()).sum();
        assert_eq!(per_class, 9);
        assert_eq!(report.class(TaskClass::Long).map(|c| c.count()), Some(2));
    }

    // FCFS: dequeue order is arrival order, regardless of duration
    let mut by_dequeue = fcfs.tasks.clone();
    by_dequeue.sort_by_key(|t| t.dequeue_time);
    let order: Vec<u64> = by_dequeue.iter().map(|t| t.id).collect();
    assert_eq!(order, (0..9).collect::<Vec<u64>>());

    // FCFS: short tasks stuck behind long ones wait many times their own duration
    let worst_short = fcfs
        .tasks
        .iter()
        .filter(|t| t.duration == ms(20))
        .map(|t| t.response_time())
        .max()
        .unwrap();
    assert!(worst_short >= ms(60), "worst short response {:?}", worst_short);

    // SJF: the queued long task yields to shorts that arrived after it
    let dequeued_at = |id: u64| sjf.tasks[id as usize].dequeue_time;
    assert!(dequeued_at(4) > dequeued_at(5));
    assert!(dequeued_at(4) > dequeued_at(7));

    let short_fcfs = mean_response(&fcfs_report, TaskClass::Short);
    let short_sjf = mean_response(&sjf_report, TaskClass::Short);
    assert!(
        short_sjf < short_fcfs,
        "short mean: sjf {:.1} ms vs fcfs {:.1} ms",
        millis(short_sjf),
        millis(short_fcfs)
    );

    let long_fcfs = mean_response(&fcfs_report, TaskClass::Long);
    let long_sjf = mean_response(&sjf_report, TaskClass::Long);
    assert!(
        long_sjf >= long_fcfs,
        "long mean: sjf {:.1} ms vs fcfs {:.1} ms",
        millis(long_sjf),
        millis(long_fcfs)
    );
}

#[test]
fn seeded_plan_replays_identically_under_both_policies() {
    let workload = WorkloadConfig {
        num_tasks: 15,
        short_task_duration_ms: 3,
        long_task_duration_ms: 15,
        short_task_probability: 0.8,
        target_utilization: 0.9,
    };
    let base = RunConfig::new(workload, PolicyKind::Fcfs)
        .unwrap()
        .with_seed(Some(11));
    let tasks = Simulation::new(base).plan();

    let fcfs = Simulation::new(base).run_plan(tasks.clone()).unwrap();
    let sjf = Simulation::new(base.with_policy(PolicyKind::Sjf))
        .run_plan(tasks.clone())
        .unwrap();

    for outcome in [&fcfs, &sjf] {
        let durations: Vec<Duration> = outcome.tasks.iter().map(|t| t.duration).collect();
        let planned: Vec<Duration> = tasks.iter().map(|t| t.duration).collect();
        assert_eq!(durations, planned);
    }
    assert_eq!(fcfs.policy, PolicyKind::Fcfs);
    assert_eq!(sjf.policy, PolicyKind::Sjf);
}

#[test]
fn persisted_run_reads_back() {
    let workload = WorkloadConfig {
        num_tasks: 6,
        short_task_duration_ms: 2,
        long_task_duration_ms: 6,
        short_task_probability: 0.5,
        target_utilization: 0.8,
    };
    let config = RunConfig::new(workload, PolicyKind::Sjf)
        .unwrap()
        .with_seed(Some(5));
    let outcome = Simulation::new(config).run().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = results_format::CsvSink::new(dir.path().join("results"))
        .persist(outcome.policy, outcome.started_at, &outcome.tasks)
        .unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("sjf_results_") && name.ends_with(".csv"), "{}", name);

    let read = results_format::read_csv_file(&path).unwrap();
    assert_eq!(read.tasks.len(), outcome.tasks.len());
    for (back, orig) in read.tasks.iter().zip(&outcome.tasks) {
        assert_eq!(back.id, orig.id);
        assert_eq!(back.duration, orig.duration);
    }

    let live = outcome.report(&workload).unwrap();
    let replayed = AggregateReport::compute(&read.tasks, &workload).unwrap();
    assert_eq!(live.overall.count(), replayed.overall.count());
    let (a, b) = (live.overall.response.mean, replayed.overall.response.mean);
    let drift = a.max(b) - a.min(b);
    assert!(drift < ms(1), "mean response drift {:?}", drift);
}
