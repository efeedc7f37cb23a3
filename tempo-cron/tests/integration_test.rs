//! Integration tests for tempo-cron

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tempo_cron::*;
use tempo_log::MemorySink;

fn every_time_component() -> impl Iterator<Item = TimeComponents> {
    let minutes = [0u8, 1, 15, 30, 59];
    let hours = [0u8, 4, 12, 23];
    let days = [1u8, 15, 31];
    let months = [1u8, 6, 12];
    let weekdays = 0u8..=6;

    weekdays.flat_map(move |dow| {
        months.into_iter().flat_map(move |month| {
            days.into_iter().flat_map(move |day| {
                hours.into_iter().flat_map(move |hour| {
                    minutes
                        .into_iter()
                        .map(move |minute| TimeComponents::new(minute, hour, day, month, dow))
                })
            })
        })
    })
}

fn quiet_registry(now: TimeComponents) -> (JobRegistry, Arc<FixedClock>, Arc<MemorySink>) {
    let clock = Arc::new(FixedClock::new(now));
    let sink = Arc::new(MemorySink::new());
    let registry = JobRegistry::new()
        .with_clock(clock.clone())
        .with_sink(sink.clone());
    (registry, clock, sink)
}

#[test]
fn test_stored_expression_round_trips() {
    for text in [
        "* * * * *",
        "  0 12 * * MON-FRI ",
        "*/15 9-17 * * 1-5",
        "5,10,15 0 1,15 JAN,JUL SUN",
        CronPresets::YEARLY,
        CronPresets::WEEKENDS_10AM,
    ] {
        let expr: CronExpression = text.parse().unwrap();
        assert_eq!(expr.to_string(), text.trim());
        assert_eq!(CronExpression::parse(expr.expression()).unwrap(), expr);
    }
}

#[test]
fn test_cron_presets_parse() {
    for preset in [
        CronPresets::EVERY_MINUTE,
        CronPresets::EVERY_5_MINUTES,
        CronPresets::EVERY_15_MINUTES,
        CronPresets::EVERY_30_MINUTES,
        CronPresets::EVERY_HOUR,
        CronPresets::DAILY,
        CronPresets::WEEKLY,
        CronPresets::MONTHLY,
        CronPresets::YEARLY,
        CronPresets::WEEKDAYS_9AM,
        CronPresets::WEEKENDS_10AM,
    ] {
        assert!(CronExpression::parse(preset).is_ok(), "{}", preset);
    }
}

#[test]
fn test_every_minute_is_always_due() {
    let expr = CronExpression::parse("* * * * *").unwrap();
    assert!(every_time_component().all(|now| expr.is_due(&now)));
}

#[test]
fn test_hourly_depends_only_on_minute() {
    let parsed = CronExpression::parse("0 * * * *").unwrap();
    let built = CronExpression::every_hour().unwrap();

    for now in every_time_component() {
        assert_eq!(parsed.is_due(&now), now.minute == 0);
        assert_eq!(built.is_due(&now), now.minute == 0);
    }
}

#[test]
fn test_daily_at_matches_hour_and_minute() {
    let parsed = CronExpression::parse("30 4 * * *").unwrap();
    let built = CronExpression::daily_at(4, 30).unwrap();

    for hour in 0..24 {
        for minute in 0..60 {
            let now = TimeComponents::new(minute, hour, 9, 3, 2);
            let expected = hour == 4 && minute == 30;
            assert_eq!(parsed.is_due(&now), expected);
            assert_eq!(built.is_due(&now), expected);
        }
    }
}

#[test]
fn test_steps_only_for_minute_and_hour() {
    assert!(CronExpression::parse("1/5 * * * *").is_ok());
    assert!(CronExpression::parse("* */2 * * *").is_ok());

    let err = CronExpression::parse("* * 1/5 * *").unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::InvalidToken { field: FieldKind::DayOfMonth, .. }
    ));
    assert!(CronExpression::parse("* * * */2 *").is_err());
    assert!(CronExpression::parse("* * * * */2").is_err());
}

#[test]
fn test_month_ranges_do_not_wrap() {
    let full = CronExpression::parse("* * * JAN-DEC *").unwrap();
    assert!(full.field(FieldKind::Month).is_match_any());
    assert!((1..=12).all(|month| full.is_month(month)));

    assert!(CronExpression::parse("* * * DEC-JAN *").is_err());
    assert!(CronExpression::parse("* * * * FRI-MON").is_err());
}

#[test]
fn test_fields_combine_with_and() {
    // The 13th that is also a Friday, not the 13th or any Friday
    let expr = CronExpression::parse("0 0 13 * FRI").unwrap();
    assert!(expr.is_due(&TimeComponents::new(0, 0, 13, 10, 5)));
    assert!(!expr.is_due(&TimeComponents::new(0, 0, 13, 10, 4)));
    assert!(!expr.is_due(&TimeComponents::new(0, 0, 14, 10, 5)));
}

#[test]
fn test_wrong_field_count() {
    for text in ["", "* * * *", "* * * * * *", "*  * * * *"] {
        assert!(
            matches!(CronExpression::parse(text), Err(ScheduleError::FieldCount { .. })),
            "{:?}",
            text
        );
    }
}

#[test]
fn test_not_due_run_is_idempotent() {
    let (registry, clock, _) = quiet_registry(TimeComponents::new(30, 4, 1, 1, 1));
    let mut job = Job::from_fn("nightly", |_| Ok(()), &registry);
    job.daily_at(4, 30).unwrap();

    assert!(job.run(false));
    assert!(job.last_run_succeeded());

    clock.set(TimeComponents::new(31, 4, 1, 1, 1));
    for _ in 0..3 {
        assert!(!job.run(false));
        assert!(job.last_run_succeeded());
    }
    assert_eq!(job.execution_count(), 1);
}

#[test]
fn test_failure_is_contained() {
    let (registry, _, sink) = quiet_registry(TimeComponents::new(0, 0, 1, 1, 1));
    let on_fail = Arc::new(AtomicU32::new(0));
    let after_exec = Arc::new(AtomicU32::new(0));

    let fails = on_fail.clone();
    let finals = after_exec.clone();
    let handler = FnHandler::new(|_| panic!("disk full"))
        .on_fail(move |_| {
            fails.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .after_exec(move |_| {
            finals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let mut job = Job::new("fragile", "30 4 * * *", handler, &registry).unwrap();

    assert!(job.run(true));
    assert!(!job.last_run_succeeded());
    assert_eq!(on_fail.load(Ordering::SeqCst), 1);
    assert_eq!(after_exec.load(Ordering::SeqCst), 1);
    assert!(sink.contains("Job 'fragile' failed in execute"));
    assert_eq!(job.state(), LifecycleState::Idle);
}

#[test]
fn test_argument_name_rules() {
    let (registry, _, _) = quiet_registry(TimeComponents::new(0, 0, 1, 1, 1));
    let mut job = Job::from_fn("args", |_| Ok(()), &registry);

    for bad in ["bad name", "a=b", "a&b", "", "x#y", "what?"] {
        job.add_argument(bad);
    }
    assert_eq!(job.arguments().len(), 0);

    job.add_argument("valid-name");
    assert_eq!(job.arguments().len(), 1);
    job.add_argument("valid-name");
    assert_eq!(job.arguments().len(), 1);
}

#[test]
fn test_arguments_from_command_line() {
    let (registry, _, _) = quiet_registry(TimeComponents::new(0, 0, 1, 1, 1));
    let seen = Arc::new(parking_lot::Mutex::new(HashMap::new()));
    let out = seen.clone();

    let job = Job::builder(
        "export",
        FnHandler::new(move |ctx| {
            for name in ["format", "dry-run", "missing"] {
                out.lock().insert(name.to_string(), ctx.argument(name));
            }
            Ok(())
        }),
    )
    .arguments(["format", "dry-run", "missing"])
    .build(&registry)
    .unwrap();
    registry.schedule(job);

    let cli = CliArguments::parse(["format=csv", "dry-run", "format=json"]);
    assert!(registry.run_job("export", true, &cli).unwrap());

    let seen = seen.lock();
    assert_eq!(seen["format"], Some("json".to_string()));
    assert_eq!(seen["dry-run"], Some(String::new()));
    assert_eq!(seen["missing"], None);
}

#[test]
fn test_name_collision_keeps_registry_intact() {
    let (registry, _, _) = quiet_registry(TimeComponents::new(0, 0, 1, 1, 1));
    for name in ["alpha", "sync", "omega"] {
        registry.schedule(Job::from_fn(name, |_| Ok(()), &registry));
    }

    let duplicate = Job::from_fn("sync", |_| Ok(()), &registry);
    let suffix = duplicate
        .name()
        .strip_prefix("sync-")
        .expect("suffixed name");
    let number: u32 = suffix.parse().unwrap();
    assert!((1..=9999).contains(&number));

    assert_eq!(registry.names(), vec!["alpha", "sync", "omega"]);
    let stored = registry.schedule(duplicate);
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.names()[3], stored);
}

#[test]
fn test_registry_tick_runs_due_jobs_in_order() {
    let (registry, clock, _) = quiet_registry(TimeComponents::new(0, 9, 2, 9, 1));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    for (name, expression) in [
        ("first", CronPresets::WEEKDAYS_9AM),
        ("weekend", CronPresets::WEEKENDS_10AM),
        ("second", CronPresets::EVERY_15_MINUTES),
    ] {
        let order = order.clone();
        let handler = FnHandler::new(move |ctx| {
            order.lock().push(ctx.name().to_string());
            Ok(())
        });
        registry.schedule(Job::new(name, expression, handler, &registry).unwrap());
    }

    let report = registry.run_due();
    assert_eq!(report.evaluated, 3);
    assert_eq!(report.executed, 2);
    assert_eq!(*order.lock(), vec!["first", "second"]);

    clock.set(TimeComponents::new(0, 10, 7, 9, 6));
    let report = registry.run_due();
    assert_eq!(report.executed, 2);
    assert_eq!(order.lock().last().map(String::as_str), Some("second"));
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_registry() {
    let (registry, _, _) = quiet_registry(TimeComponents::new(0, 0, 1, 1, 1));
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    registry.schedule(Job::from_fn(
        "tick",
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
        &registry,
    ));

    let config = SchedulerConfig::default()
        .with_tick_interval(std::time::Duration::from_millis(10))
        .with_log_execution(false);
    let mut scheduler = CronScheduler::with_config(Arc::new(registry), config);

    scheduler.start().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    scheduler.stop().await.unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(scheduler.registry().last_run_succeeded("tick").unwrap());
}
