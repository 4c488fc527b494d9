//! A single writer and a single reader sharing a queue.

use crate::mount_threads;
use timewinder_check::{Evaluator, FnPredicate, Spec};
use timewinder_core::{CoreResult, Value};
use timewinder_runtime::{ObjectModel, StateController, StepProcess};

/// Mount name of the queue object
pub const QUEUE: &str = "queue";

/// Length the writer waits at
pub const CAPACITY: usize = 2;

/// An empty queue
#[must_use]
pub fn queue() -> ObjectModel {
    ObjectModel::new(QUEUE, "Queue").with_field("queue", Value::List(Vec::new()))
}

/// Writer that blocks while the queue is at capacity
#[must_use]
pub fn waiting_writer() -> StepProcess {
    StepProcess::new("writer")
        .step("write", |ctx| {
            ctx.object_mut(QUEUE)?.push("queue", "msg")?;
            ctx.goto("wait");
            Ok(())
        })
        .step("wait", |ctx| {
            if ctx.object(QUEUE)?.list("queue")?.len() >= CAPACITY {
                ctx.goto("wait");
            } else {
                ctx.goto("write");
            }
            Ok(())
        })
}

/// Writer that never checks the queue length
#[must_use]
pub fn eager_writer() -> StepProcess {
    StepProcess::new("writer").step("write", |ctx| {
        ctx.object_mut(QUEUE)?.push("queue", "msg")?;
        ctx.goto("write");
        Ok(())
    })
}

/// Reader that spins while the queue is empty
#[must_use]
pub fn waiting_reader() -> StepProcess {
    StepProcess::new("reader").step("read", |ctx| {
        let queue = ctx.object_mut(QUEUE)?;
        if !queue.list("queue")?.is_empty() {
            queue.pop_front("queue")?;
        }
        ctx.goto("read");
        Ok(())
    })
}

/// Reader that pops without looking
#[must_use]
pub fn eager_reader() -> StepProcess {
    StepProcess::new("reader").step("read", |ctx| {
        ctx.object_mut(QUEUE)?.pop_front("queue")?;
        ctx.goto("read");
        Ok(())
    })
}

/// The queue never holds more than [`CAPACITY`] messages
#[must_use]
pub fn bounded() -> Spec {
    Spec::always(FnPredicate::new("bounded_queue", |m| {
        Ok(m.object(QUEUE)?.list("queue")?.len() <= CAPACITY)
    }))
}

/// A writer and a reader over a fresh queue, checked for [`bounded`]
///
/// # Errors
///
/// Returns error if the mounts collide
pub fn pipeline(writer: StepProcess, reader: StepProcess) -> CoreResult<Evaluator> {
    let mut sc = StateController::new();
    sc.mount(queue())?;
    mount_threads(&mut sc, [writer, reader])?;
    Ok(Evaluator::new(sc).with_spec(bounded()))
}
