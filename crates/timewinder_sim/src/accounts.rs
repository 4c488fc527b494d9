//! Bank transfers between two accounts.

use crate::mount_threads;
use std::sync::Arc;
use timewinder_check::{Evaluator, FnPredicate, ForAll, Ltl, Predicate, Spec};
use timewinder_core::{ChoiceSet, CoreResult, Value};
use timewinder_runtime::{ObjectModel, StateController, StepContext, StepFault, StepProcess};

/// Object kind of every account
pub const ACCOUNT: &str = "Account";

/// Opening balance of both accounts
pub const OPENING_BALANCE: i64 = 5;

/// An account holding `balance` in its `acc` field
#[must_use]
pub fn account(name: &str, balance: i64) -> ObjectModel {
    ObjectModel::new(name, ACCOUNT)
        .with_field("name", name)
        .with_field("acc", balance)
}

fn adjust(ctx: &mut StepContext<'_>, account: &str, delta: i64) -> Result<(), StepFault> {
    let account = ctx.object_mut(account)?;
    let acc = account.int("acc")?;
    account.set("acc", acc + delta);
    Ok(())
}

/// Move `amount` from `sender` to `receiver` without checking funds
///
/// `amount` may be a [`ChoiceSet`], explored as one branch per candidate.
#[must_use]
pub fn withdraw(sender: &'static str, receiver: &'static str, amount: impl Into<Value>) -> StepProcess {
    StepProcess::new("withdraw")
        .with_local("amount", amount)
        .step("withdraw", move |ctx| {
            let amount = ctx.local_int("amount")?;
            adjust(ctx, sender, -amount)
        })
        .step("deposit", move |ctx| {
            let amount = ctx.local_int("amount")?;
            adjust(ctx, receiver, amount)
        })
}

/// Like [`withdraw`], but gives up unless the sender can cover `amount`
///
/// The check and the withdrawal are one atomic step.
#[must_use]
pub fn check_and_withdraw(
    sender: &'static str,
    receiver: &'static str,
    amount: impl Into<Value>,
) -> StepProcess {
    StepProcess::new("check_and_withdraw")
        .with_local("amount", amount)
        .step("withdraw", move |ctx| {
            let amount = ctx.local_int("amount")?;
            if amount <= ctx.object(sender)?.int("acc")? {
                adjust(ctx, sender, -amount)
            } else {
                ctx.stop();
                Ok(())
            }
        })
        .step("deposit", move |ctx| {
            let amount = ctx.local_int("amount")?;
            adjust(ctx, receiver, amount)
        })
}

/// No account is ever overdrawn
#[must_use]
pub fn no_overdrafts() -> ForAll {
    ForAll::new("no_overdrafts", |account| Ok(account.int("acc")? >= 0)).of_kind(ACCOUNT)
}

fn bank(threads: Vec<StepProcess>) -> CoreResult<StateController> {
    let mut sc = StateController::new();
    sc.mount(account("alice", OPENING_BALANCE))?;
    sc.mount(account("bob", OPENING_BALANCE))?;
    mount_threads(&mut sc, threads)?;
    Ok(sc)
}

/// One unguarded transfer of a fixed amount from alice to bob
///
/// # Errors
///
/// Returns error if the mounts collide
pub fn overdraft(amount: i64) -> CoreResult<Evaluator> {
    let sc = bank(vec![withdraw("alice", "bob", amount)])?;
    Ok(Evaluator::new(sc).with_spec(Spec::always(no_overdrafts())))
}

/// Two concurrent transfers from alice to bob, each of a chosen amount
///
/// # Errors
///
/// Returns error if the mounts collide
pub fn transfers(guarded: bool, amounts: &ChoiceSet) -> CoreResult<Evaluator> {
    let threads = (0..2)
        .map(|_| {
            if guarded {
                check_and_withdraw("alice", "bob", amounts.clone())
            } else {
                withdraw("alice", "bob", amounts.clone())
            }
        })
        .collect();
    let sc = bank(threads)?;
    Ok(Evaluator::new(sc).with_spec(Spec::always(no_overdrafts())))
}

/// A guarded transfer of a chosen amount that bob must eventually feel
///
/// Fails when the chosen amount is zero: the transfer completes without
/// bob's balance ever rising.
///
/// # Errors
///
/// Returns error if the mounts collide
pub fn settlement(amounts: &ChoiceSet) -> CoreResult<Evaluator> {
    let sc = bank(vec![check_and_withdraw("alice", "bob", amounts.clone())])?;
    let credited: Arc<dyn Predicate> = Arc::new(FnPredicate::new(
        "bob_credited",
        |m| Ok(m.object("bob")?.int("acc")? > OPENING_BALANCE),
    ));
    Ok(Evaluator::new(sc)
        .with_spec(Spec::always(no_overdrafts()))
        .with_spec(Ltl::eventually(credited)))
}
