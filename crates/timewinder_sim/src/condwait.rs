//! Producers and consumers on a bounded queue, synchronised by a single
//! condition variable.
//!
//! Each worker goes to sleep when it cannot make progress and, after making
//! progress, wakes one arbitrary sleeper. With one condition variable shared
//! by both roles a producer can wake another producer instead of a consumer,
//! so with two producers and one consumer every worker can end up asleep.

use crate::mount_threads;
use timewinder_check::{Evaluator, ForAll, Spec};
use timewinder_core::{ChoiceSet, CoreError, CoreResult, Value};
use timewinder_runtime::{ObjectModel, StateController, StepContext, StepFault, StepProcess};

/// Mount name of the queue
pub const QUEUE: &str = "bqueue";

/// Mount name of the sleep/wake flags
pub const RUNNING: &str = "running";

const COND_WAIT: &str = "CondWait";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Producer,
    Consumer,
}

fn statuses(ctx: &StepContext<'_>) -> Result<Vec<bool>, StepFault> {
    let mut out = Vec::new();
    for (i, value) in ctx.object(RUNNING)?.list("status")?.iter().enumerate() {
        out.push(value.expect_bool(&format!("{}.status[{}]", RUNNING, i))?);
    }
    Ok(out)
}

fn set_status(ctx: &mut StepContext<'_>, index: usize, awake: bool) -> Result<(), StepFault> {
    let status = ctx.object_mut(RUNNING)?.list_mut("status")?;
    let len = status.len();
    let slot = status.get_mut(index).ok_or(CoreError::IndexOutOfBounds {
        path: format!("{}.status", RUNNING),
        index,
        len,
    })?;
    *slot = Value::Bool(awake);
    Ok(())
}

fn worker(role: Role, id: usize) -> StepProcess {
    let label = match role {
        Role::Producer => "producer",
        Role::Consumer => "consumer",
    };
    StepProcess::new(label)
        .with_local("wake", Value::Null)
        .step("loop", move |ctx| {
            let status = statuses(ctx)?;
            if !status.get(id).copied().unwrap_or(false) {
                ctx.pause("paused");
                ctx.goto("loop");
                return Ok(());
            }

            let queue = ctx.object(QUEUE)?;
            let len = queue.list("queue")?.len();
            let max = usize::try_from(queue.int("max")?).unwrap_or(0);
            let blocked = match role {
                Role::Producer => len >= max,
                Role::Consumer => len == 0,
            };
            if blocked {
                set_status(ctx, id, false)?;
                ctx.goto("loop");
                return Ok(());
            }

            let queue = ctx.object_mut(QUEUE)?;
            match role {
                Role::Producer => queue.push("queue", 4)?,
                Role::Consumer => {
                    queue.pop_front("queue")?;
                }
            }

            let sleeping: Vec<i64> = status
                .iter()
                .enumerate()
                .filter(|(_, awake)| !**awake)
                .map(|(i, _)| i as i64)
                .collect();
            if sleeping.is_empty() {
                ctx.goto("loop");
            } else {
                ctx.choose("wake", ChoiceSet::new(sleeping));
                ctx.goto("notify");
            }
            Ok(())
        })
        .step("notify", |ctx| {
            let wake = ctx.local_int("wake")?;
            let index = usize::try_from(wake)
                .map_err(|_| StepFault::Custom(format!("cannot wake thread {}", wake)))?;
            set_status(ctx, index, true)?;
            ctx.set_local("wake", Value::Null);
            ctx.goto("loop");
            Ok(())
        })
}

/// Nobody can run only if everybody is asleep
#[must_use]
pub fn no_deadlocks() -> ForAll {
    ForAll::new("no_deadlocks", |running| {
        Ok(running
            .list("status")?
            .iter()
            .any(|awake| awake.as_bool().unwrap_or(false)))
    })
    .of_kind(COND_WAIT)
}

/// `producers` producers and `consumers` consumers over a queue of `size`
///
/// # Errors
///
/// Returns error if the mounts collide
pub fn bounded_queue(producers: usize, consumers: usize, size: usize) -> CoreResult<Evaluator> {
    let threads = producers + consumers;
    let mut sc = StateController::new();
    sc.mount(
        ObjectModel::new(RUNNING, COND_WAIT)
            .with_field("status", Value::List(vec![Value::Bool(true); threads])),
    )?;
    sc.mount(
        ObjectModel::new(QUEUE, "BoundedQueue")
            .with_field("queue", Value::List(Vec::new()))
            .with_field("max", size as i64),
    )?;
    mount_threads(
        &mut sc,
        (0..threads).map(|id| {
            if id < producers {
                worker(Role::Producer, id)
            } else {
                worker(Role::Consumer, id)
            }
        }),
    )?;
    Ok(Evaluator::new(sc).with_spec(Spec::always(no_deadlocks())))
}
