//! Property tests for ordering, monotonic status and the completed_at pairing.

mod common;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use common::{fast_polling, RecordingHandler};
use tasker_executor::executor::PollingExecutor;
use tasker_executor::models::{CompletionOutcome, NewTask};
use tasker_executor::store::InMemoryTaskStore;
use tasker_executor::TaskStatus;

fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    /// Property: one cycle executes every pending task in (created_at, id) order
    #[test]
    fn cycle_executes_in_creation_order(offsets in prop::collection::vec(0i64..20, 1..25)) {
        let table = InMemoryTaskStore::new();
        let mut expected = Vec::new();
        for (n, offset) in offsets.iter().enumerate() {
            let task = table.insert_at(
                NewTask::new(format!("task-{n}"), "prop"),
                base_time() + ChronoDuration::seconds(*offset),
            );
            expected.push((task.created_at, task.id));
        }
        expected.sort();
        let expected: Vec<i64> = expected.into_iter().map(|(_, id)| id).collect();

        let mut config = fast_polling();
        config.inter_task_delay_ms = 0;
        let handler = RecordingHandler::new();
        let executor = PollingExecutor::new(config, table.clone(), handler.clone());

        let report = runtime().block_on(async {
            let mut store = table.clone();
            executor.run_cycle(&mut store, &CancellationToken::new()).await
        }).unwrap();

        prop_assert_eq!(&report.completed, &expected);
        prop_assert_eq!(handler.executed(), expected);
        for task in table.snapshot() {
            prop_assert_eq!(task.status, TaskStatus::Completed);
            prop_assert!(task.is_consistent());
        }
    }

    /// Property: status never returns to pending and completed_at never changes once set
    #[test]
    fn completion_is_monotone(
        task_count in 1usize..10,
        completions in prop::collection::vec(1i64..12, 0..40),
    ) {
        let table = InMemoryTaskStore::new();
        for n in 0..task_count {
            table.insert(NewTask::new(format!("task-{n}"), "prop"));
        }

        let mut first_completion: HashMap<i64, NaiveDateTime> = HashMap::new();
        for id in completions {
            let outcome = table.mark_completed(id);
            match outcome {
                CompletionOutcome::Completed { completed_at } => {
                    prop_assert!(first_completion.insert(id, completed_at).is_none());
                }
                CompletionOutcome::AlreadyCompleted => {
                    prop_assert!(first_completion.contains_key(&id));
                }
                CompletionOutcome::NotFound => {
                    prop_assert!(id > task_count as i64);
                }
            }

            for task in table.snapshot() {
                prop_assert!(task.is_consistent());
                match first_completion.get(&task.id) {
                    Some(completed_at) => {
                        prop_assert_eq!(task.status, TaskStatus::Completed);
                        prop_assert_eq!(task.completed_at, Some(*completed_at));
                    }
                    None => prop_assert_eq!(task.status, TaskStatus::Pending),
                }
            }
        }
    }
}
