//! Contract tests for the async_runtime public API

use async_runtime::{
    all, all_settled, any, race, DrainReport, EventLoop, Handler, HandlerResult, MicroTask,
    Promise, PromiseId, PromiseState, Resolvers, RuntimeConfig, RuntimeError, RuntimeResult,
    Scheduler, SettledOutcome, Task, TaskSpawner, UnhandledRejection,
};
use core_types::{ErrorKind, JsError, Thenable, Value};

mod promise_contract {
    use super::*;

    #[test]
    fn with_resolvers_returns_pending_promise_and_resolvers() {
        let (promise, resolvers): (Promise, Resolvers) = Promise::with_resolvers();
        assert!(promise.is_pending());
        assert!(resolvers.promise().ptr_eq(&promise));
        assert!(!resolvers.is_resolved());
    }

    #[test]
    fn then_returns_promise() {
        let promise = Promise::resolve(Value::Smi(1));
        let derived: Promise = promise.then(None, None);
        let _ = derived;
    }

    #[test]
    fn catch_and_finally_return_promise() {
        let promise = Promise::reject(Value::Smi(1));
        let caught: Promise = promise.catch(Ok);
        let cleaned: Promise = caught.finally(|| Ok(Value::Undefined));
        let _ = cleaned;
    }

    #[test]
    fn handler_result_is_ok_or_err_value() {
        let ok: HandlerResult = Handler::new(Ok).call(Value::Smi(1));
        let err: HandlerResult = Handler::new(Err).call(Value::Smi(2));
        assert_eq!(ok, Ok(Value::Smi(1)));
        assert_eq!(err, Err(Value::Smi(2)));
    }

    #[test]
    fn promise_id_is_stable_and_displayable() {
        let promise = Promise::resolve(Value::Undefined);
        let id: PromiseId = promise.id();
        assert_eq!(id, promise.clone().id());
        assert_eq!(id.to_string(), format!("#{}", id.as_u64()));
    }

    #[test]
    fn state_is_a_snapshot() {
        let (promise, resolvers) = Promise::with_resolvers();
        let before = promise.state();
        resolvers.resolve(Value::Smi(1));
        assert_eq!(before, PromiseState::Pending);
        assert_eq!(promise.state(), PromiseState::Fulfilled(Value::Smi(1)));
    }

    #[test]
    fn promise_converts_to_thenable_value() {
        let value = Value::from(Promise::resolve(Value::Smi(1)));
        assert!(value.is_thenable());
        assert_eq!(value.type_of(), "object");
        assert!(Promise::from_value(&value).is_some());
    }

    #[test]
    fn promise_implements_thenable() {
        fn assert_thenable<T: Thenable>() {}
        assert_thenable::<Promise>();
    }
}

mod combinator_contract {
    use super::*;

    #[test]
    fn combinators_return_promises() {
        let none: Vec<Value> = Vec::new();
        let _: Promise = all(none.clone());
        let _: Promise = all_settled(none.clone());
        let _: Promise = race(none.clone());
        let _: Promise = any(none);
    }

    #[test]
    fn any_rejects_with_aggregate_error() {
        let result = any(Vec::<Value>::new());
        match result.state() {
            PromiseState::Rejected(Value::Error(JsError { kind, errors, .. })) => {
                assert_eq!(kind, ErrorKind::AggregateError);
                assert!(errors.is_empty());
            }
            other => panic!("expected AggregateError, got {:?}", other),
        }
    }

    #[test]
    fn settled_outcome_record_fields() {
        let fulfilled = Value::from(SettledOutcome::Fulfilled(Value::Smi(1)));
        assert_eq!(fulfilled.get("status"), Some(&Value::from("fulfilled")));
        assert_eq!(fulfilled.get("value"), Some(&Value::Smi(1)));
        assert_eq!(fulfilled.get("reason"), None);
    }
}

mod scheduler_contract {
    use super::*;

    #[test]
    fn run_microtasks_returns_report() {
        let scheduler = Scheduler::new();
        scheduler.enqueue(MicroTask::new(|| {}));
        let report: RuntimeResult<DrainReport> = scheduler.run_microtasks();
        assert_eq!(report.unwrap(), DrainReport { ran: 1, panicked: 0 });
    }

    #[test]
    fn default_scheduler_is_per_thread() {
        let here = Scheduler::current();
        let elsewhere_is_distinct = std::thread::spawn(|| Scheduler::current().pending())
            .join()
            .unwrap();
        here.queue_microtask(|| {});
        assert_eq!(elsewhere_is_distinct, 0);
        assert_eq!(here.pending(), 1);
        here.run_microtasks().unwrap();
    }

    #[test]
    fn unhandled_rejections_are_values() {
        let scheduler = Scheduler::new();
        scheduler.set_rejection_tracking(true);
        Promise::reject_in(&scheduler, Value::Smi(1));
        let records: Vec<UnhandledRejection> = scheduler.take_unhandled_rejections();
        assert_eq!(records[0].reason, Value::Smi(1));
    }
}

mod event_loop_contract {
    use super::*;

    #[test]
    fn event_loop_accepts_tasks_and_microtasks() {
        let mut event_loop = EventLoop::with_scheduler(Scheduler::new());
        event_loop.enqueue_task(Task::new(|| Ok(())));
        event_loop.enqueue_microtask(MicroTask::new(|| {}));
        let spawner: TaskSpawner = event_loop.spawner();
        spawner.spawn(Task::new(|| Ok(())));
        event_loop.run_until_done().unwrap();
        assert!(event_loop.is_task_queue_empty());
    }

    #[test]
    fn event_loop_default_drives_current_scheduler() {
        let event_loop = EventLoop::default();
        assert!(event_loop.scheduler().ptr_eq(&Scheduler::current()));
    }

    #[test]
    fn runtime_error_messages() {
        let err = RuntimeError::TaskFailed(Value::from("x"));
        assert_eq!(err.to_string(), "task failed: x");
    }
}

mod config_contract {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.microtask_budget, None);
        assert_eq!(config.track_rejections, None);
    }

    #[test]
    fn config_rejects_bad_json() {
        assert!(matches!(
            RuntimeConfig::from_json("not json"),
            Err(RuntimeError::Config(_))
        ));
    }
}
