use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::converter::{ConversionResult, ConversionTask};
use crate::error::{ConvertError, SetupError};

/// A task together with what happened to it.
#[derive(Debug)]
pub struct ConversionOutcome {
    pub task: ConversionTask,
    pub result: ConversionResult,
}

impl ConversionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `convert` over every task on a pool of `workers` threads and blocks
/// until all of them are done.
///
/// Each task runs exactly once. A task that fails (or panics inside the codec)
/// yields an error outcome and the rest carry on. `on_complete` is called from
/// the worker thread as each task finishes, in completion order; the returned
/// vector has one outcome per task.
pub fn dispatch<F, C>(
    tasks: Vec<ConversionTask>,
    workers: usize,
    convert: F,
    on_complete: C,
) -> Result<Vec<ConversionOutcome>, SetupError>
where
    F: Fn(&ConversionTask) -> ConversionResult + Sync,
    C: Fn(&ConversionOutcome) + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("webp-worker-{i}"))
        .build()?;

    let total = tasks.len();
    info!(total, workers = pool.current_num_threads(), "dispatching");

    let outcomes: Vec<ConversionOutcome> = pool.install(|| {
        tasks
            .into_par_iter()
            .map(|task| {
                debug!(src = %task.source.display(), "start");
                let result = panic::catch_unwind(AssertUnwindSafe(|| convert(&task)))
                    .unwrap_or_else(|payload| Err(ConvertError::Panicked(panic_message(&*payload))));
                let outcome = ConversionOutcome { task, result };
                on_complete(&outcome);
                outcome
            })
            .collect()
    });

    debug_assert_eq!(outcomes.len(), total);
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EncodeOptions;
    use crate::converter::{self, Converted};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn fake_tasks(n: usize) -> Vec<ConversionTask> {
        (0..n)
            .map(|i| ConversionTask {
                source: PathBuf::from(format!("src/{i}.jpg")),
                destination: PathBuf::from(format!("out/{i}.webp")),
                ext: "jpg".into(),
                source_size: 100,
                options: EncodeOptions { quality: 80, lossless: false, method: 4 },
            })
            .collect()
    }

    fn ok(_: &ConversionTask) -> ConversionResult {
        Ok(Converted { original_size: 100, converted_size: 40 })
    }

    #[test]
    fn every_task_runs_exactly_once() {
        let seen = Mutex::new(Vec::new());
        let outcomes = dispatch(
            fake_tasks(25),
            4,
            |t| {
                seen.lock().unwrap().push(t.source.clone());
                ok(t)
            },
            |_| {},
        )
        .unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 25);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25);
        assert_eq!(outcomes.len(), 25);
    }

    #[test]
    fn never_exceeds_worker_count() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        dispatch(
            fake_tasks(16),
            2,
            |t| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(15));
                active.fetch_sub(1, Ordering::SeqCst);
                ok(t)
            },
            |_| {},
        )
        .unwrap();
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrency was {peak}");
    }

    #[test]
    fn failures_and_panics_do_not_stop_the_batch() {
        let completed = AtomicUsize::new(0);
        let outcomes = dispatch(
            fake_tasks(9),
            3,
            |t| {
                let name = t.source.to_string_lossy();
                if name.ends_with("3.jpg") {
                    panic!("codec blew up");
                }
                if name.ends_with("5.jpg") {
                    return Err(ConvertError::EmptyOutput);
                }
                ok(t)
            },
            |_| {
                completed.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 9);
        let failures: Vec<_> = outcomes.iter().filter(|o| !o.is_ok()).collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count() + failures.len(), 9);
        assert!(failures.iter().any(|o| matches!(
            &o.result,
            Err(ConvertError::Panicked(msg)) if msg == "codec blew up"
        )));
    }

    #[test]
    fn empty_batch_is_fine() {
        let outcomes = dispatch(Vec::new(), 4, ok, |_| {}).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn converts_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let tasks: Vec<_> = (0..3)
            .map(|i| {
                let src = dir.path().join(format!("{i}.png"));
                converter::tests::write_png(&src);
                converter::tests::task(
                    &src,
                    &dir.path().join(format!("{i}.webp")),
                    converter::tests::LOSSY,
                )
            })
            .collect();

        let outcomes = dispatch(tasks, 4, converter::convert, |_| {}).unwrap();
        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            let converted = outcome.result.as_ref().unwrap();
            assert!(converted.converted_size > 0);
            assert!(outcome.task.destination.exists());
        }
    }
}
