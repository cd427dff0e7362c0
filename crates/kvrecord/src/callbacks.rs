//! # Callback Pipeline
//!
//! Every mutating operation on a record runs inside a hook chain registered
//! on its model type:
//!
//! ```text
//! before hooks ──▶ around hooks ──▶ operation ──▶ after hooks
//!     │                 │
//!     └─ Flow::Halt     └─ never calls next.run()
//!          ⇒ operation and remaining hooks skipped, call returns Ok(false)
//! ```
//!
//! Hooks are registered per [`Operation`] and [`Phase`] and run in
//! registration order. Around hooks nest: the first registered is the
//! outermost. After hooks run only when nothing halted and the operation
//! itself reported success.
//!
//! `update` runs the `Update` chain around "assign, then save", and `save`
//! runs the `Save` chain, so update hooks wrap save hooks.
//!
//! A hook returning `Err` aborts the chain and the error propagates to the
//! caller unchanged.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Save,
    Update,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    Around,
    After,
}

/// What a before hook tells the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

pub type BeforeHook = Arc<dyn Fn(&mut Record) -> Result<Flow> + Send + Sync>;
pub type AroundHook = Arc<dyn Fn(&mut Record, &mut Next<'_>) -> Result<()> + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&mut Record) -> Result<()> + Send + Sync>;

/// Continuation handed to around hooks.
///
/// Calling [`Next::run`] proceeds to the next around hook (or the operation
/// itself) and returns whether the operation succeeded. Returning without
/// calling it halts the chain.
pub struct Next<'a> {
    cont: &'a mut dyn FnMut(&mut Record) -> Result<bool>,
}

impl Next<'_> {
    pub fn run(&mut self, record: &mut Record) -> Result<bool> {
        (self.cont)(record)
    }
}

/// Result of running an operation through its chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The operation ran; the flag is its own success result.
    Completed(bool),
    /// A hook stopped the chain before the operation finished.
    Halted { by: String },
}

impl Outcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Completed(true))
    }
}

#[derive(Clone, Default)]
struct Chain {
    before: Vec<(String, BeforeHook)>,
    around: Vec<(String, AroundHook)>,
    after: Vec<(String, AfterHook)>,
}

/// Ordered hook chains for one model type, keyed by operation.
#[derive(Clone, Default)]
pub struct CallbackPipeline {
    chains: HashMap<Operation, Chain>,
}

impl fmt::Debug for CallbackPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (op, chain) in &self.chains {
            let names: Vec<&str> = chain
                .before
                .iter()
                .map(|(n, _)| n.as_str())
                .chain(chain.around.iter().map(|(n, _)| n.as_str()))
                .chain(chain.after.iter().map(|(n, _)| n.as_str()))
                .collect();
            map.entry(op, &names);
        }
        map.finish()
    }
}

impl CallbackPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(&mut self, op: Operation, name: impl Into<String>, hook: BeforeHook) {
        self.chains
            .entry(op)
            .or_default()
            .before
            .push((name.into(), hook));
    }

    pub fn around(&mut self, op: Operation, name: impl Into<String>, hook: AroundHook) {
        self.chains
            .entry(op)
            .or_default()
            .around
            .push((name.into(), hook));
    }

    pub fn after(&mut self, op: Operation, name: impl Into<String>, hook: AfterHook) {
        self.chains
            .entry(op)
            .or_default()
            .after
            .push((name.into(), hook));
    }

    /// Names of the hooks registered for `op` in `phase`, in run order.
    pub fn hook_names(&self, op: Operation, phase: Phase) -> Vec<&str> {
        let Some(chain) = self.chains.get(&op) else {
            return Vec::new();
        };
        match phase {
            Phase::Before => chain.before.iter().map(|(n, _)| n.as_str()).collect(),
            Phase::Around => chain.around.iter().map(|(n, _)| n.as_str()).collect(),
            Phase::After => chain.after.iter().map(|(n, _)| n.as_str()).collect(),
        }
    }

    pub fn is_empty(&self, op: Operation) -> bool {
        self.chains.get(&op).map_or(true, |chain| {
            chain.before.is_empty() && chain.around.is_empty() && chain.after.is_empty()
        })
    }

    /// Run `operation` for `record` wrapped in the chain for `op`.
    pub fn run(
        &self,
        op: Operation,
        record: &mut Record,
        operation: &mut dyn FnMut(&mut Record) -> Result<bool>,
    ) -> Result<Outcome> {
        let Some(chain) = self.chains.get(&op) else {
            return Ok(Outcome::Completed(operation(record)?));
        };

        for (name, hook) in &chain.before {
            if hook(record)? == Flow::Halt {
                debug!(target: "kvrecord::callbacks", ?op, hook = %name, id = record.id(), "before hook halted chain");
                return Ok(Outcome::Halted { by: name.clone() });
            }
        }

        let ok = match wrap(op, &chain.around, record, operation)? {
            Outcome::Completed(ok) => ok,
            halted => return Ok(halted),
        };
        if !ok {
            return Ok(Outcome::Completed(false));
        }

        for (_, hook) in &chain.after {
            hook(record)?;
        }
        Ok(Outcome::Completed(true))
    }
}

fn wrap<'c>(
    op: Operation,
    arounds: &[(String, AroundHook)],
    record: &mut Record,
    operation: &mut (dyn FnMut(&mut Record) -> Result<bool> + 'c),
) -> Result<Outcome> {
    let Some(((name, hook), rest)) = arounds.split_first() else {
        return Ok(Outcome::Completed(operation(record)?));
    };

    let mut reached: Option<Outcome> = None;
    {
        let mut cont = |r: &mut Record| -> Result<bool> {
            let inner = wrap(op, rest, r, &mut *operation)?;
            let ok = inner.succeeded();
            reached = Some(inner);
            Ok(ok)
        };
        let mut next = Next { cont: &mut cont };
        hook(record, &mut next)?;
    }

    match reached {
        Some(inner) => Ok(inner),
        None => {
            debug!(target: "kvrecord::callbacks", ?op, hook = %name, id = record.id(), "around hook did not yield");
            Ok(Outcome::Halted { by: name.clone() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::widgets;
    use parking_lot::Mutex;
    use serde_json::json;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logger(log: &Log, entry: &'static str) -> BeforeHook {
        let log = log.clone();
        Arc::new(move |_: &mut Record| -> Result<Flow> {
            log.lock().push(entry.to_string());
            Ok(Flow::Continue)
        })
    }

    fn run(pipeline: &CallbackPipeline, log: &Log) -> Outcome {
        let mut record = widgets().build(json!({})).unwrap();
        let log = log.clone();
        pipeline
            .run(Operation::Save, &mut record, &mut |_: &mut Record| -> Result<bool> {
                log.lock().push("op".into());
                Ok(true)
            })
            .unwrap()
    }

    #[test]
    fn empty_pipeline_runs_operation() {
        let log: Log = Arc::default();
        assert_eq!(run(&CallbackPipeline::new(), &log), Outcome::Completed(true));
        assert_eq!(*log.lock(), vec!["op"]);
    }

    #[test]
    fn phases_run_in_order() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        pipeline.before(Operation::Save, "a", logger(&log, "a"));
        pipeline.before(Operation::Save, "b", logger(&log, "b"));
        let after_log = log.clone();
        pipeline.after(
            Operation::Save,
            "c",
            Arc::new(move |_: &mut Record| -> Result<()> {
                after_log.lock().push("c".into());
                Ok(())
            }),
        );

        assert_eq!(run(&pipeline, &log), Outcome::Completed(true));
        assert_eq!(*log.lock(), vec!["a", "b", "op", "c"]);
    }

    #[test]
    fn before_halt_skips_operation_and_after() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        pipeline.before(Operation::Save, "stop", Arc::new(|_: &mut Record| -> Result<Flow> { Ok(Flow::Halt) }));
        pipeline.before(Operation::Save, "never", logger(&log, "never"));
        let after_log = log.clone();
        pipeline.after(
            Operation::Save,
            "after",
            Arc::new(move |_: &mut Record| -> Result<()> {
                after_log.lock().push("after".into());
                Ok(())
            }),
        );

        assert_eq!(
            run(&pipeline, &log),
            Outcome::Halted { by: "stop".into() }
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn around_hooks_nest_in_registration_order() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        for name in ["outer", "inner"] {
            let log = log.clone();
            pipeline.around(
                Operation::Save,
                name,
                Arc::new(move |record: &mut Record, next: &mut Next<'_>| -> Result<()> {
                    log.lock().push(format!("{name}:in"));
                    next.run(record)?;
                    log.lock().push(format!("{name}:out"));
                    Ok(())
                }),
            );
        }

        assert_eq!(run(&pipeline, &log), Outcome::Completed(true));
        assert_eq!(
            *log.lock(),
            vec!["outer:in", "inner:in", "op", "inner:out", "outer:out"]
        );
    }

    #[test]
    fn around_without_yield_halts() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        pipeline.around(Operation::Save, "swallow", Arc::new(|_: &mut Record, _: &mut Next<'_>| -> Result<()> { Ok(()) }));

        assert_eq!(
            run(&pipeline, &log),
            Outcome::Halted { by: "swallow".into() }
        );
        assert!(log.lock().is_empty());
    }

    #[test]
    fn inner_halt_propagates_through_outer_around() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        pipeline.around(
            Operation::Save,
            "outer",
            Arc::new(|record: &mut Record, next: &mut Next<'_>| -> Result<()> {
                next.run(record)?;
                Ok(())
            }),
        );
        pipeline.around(Operation::Save, "inner", Arc::new(|_: &mut Record, _: &mut Next<'_>| -> Result<()> { Ok(()) }));

        assert_eq!(
            run(&pipeline, &log),
            Outcome::Halted { by: "inner".into() }
        );
    }

    #[test]
    fn failed_operation_skips_after_hooks() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        let after_log = log.clone();
        pipeline.after(
            Operation::Save,
            "after",
            Arc::new(move |_: &mut Record| -> Result<()> {
                after_log.lock().push("after".into());
                Ok(())
            }),
        );

        let mut record = widgets().build(json!({})).unwrap();
        let outcome = pipeline
            .run(Operation::Save, &mut record, &mut |_: &mut Record| -> Result<bool> { Ok(false) })
            .unwrap();
        assert_eq!(outcome, Outcome::Completed(false));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn hooks_are_scoped_to_their_operation() {
        let log: Log = Arc::default();
        let mut pipeline = CallbackPipeline::new();
        pipeline.before(Operation::Destroy, "d", logger(&log, "d"));

        run(&pipeline, &log);
        assert_eq!(*log.lock(), vec!["op"]);
        assert!(pipeline.is_empty(Operation::Save));
        assert_eq!(pipeline.hook_names(Operation::Destroy, Phase::Before), vec!["d"]);
    }

    #[test]
    fn hook_error_propagates() {
        let mut pipeline = CallbackPipeline::new();
        pipeline.before(
            Operation::Save,
            "boom",
            Arc::new(|_: &mut Record| -> Result<Flow> {
                Err(crate::error::RecordError::Store("boom".into()))
            }),
        );
        let mut record = widgets().build(json!({})).unwrap();
        let result = pipeline.run(Operation::Save, &mut record, &mut |_: &mut Record| -> Result<bool> { Ok(true) });
        assert!(result.is_err());
    }
}
