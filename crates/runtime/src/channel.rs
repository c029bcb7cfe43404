//! Mailbox operations for actor-style messaging
//!
//! Every process owns one mailbox. Anyone holding the process (or the
//! mailbox itself) may `post`; only code running on the owning process's
//! stack may `receive`.
//!
//! ## Delivery
//!
//! Messages are queued in FIFO order. A receiver that finds the queue empty
//! registers itself and suspends. The post that arrives next wakes it on a
//! later turn, and the message is dequeued at wake time, so order holds even
//! when several posts land before the receiver runs.
//!
//! At most one receiver may wait on a mailbox. A second `receive` while one
//! is pending fails with `ReceiverPending` instead of silently replacing it.
//!
//! ## Stack Effects
//!
//! - `post`: ( msg proc|mailbox -- )
//! - `receive`: ( -- msg ), suspends until a message is available
//! - `mailbox`: ( -- mailbox ), the current process's mailbox

use crate::interpreter::resume_later;
use crate::scheduler::{self, later};
use slang_core::{
    Continuation, Env, Kind, Mailbox, SlangError, SlangResult, Stack, Value, Waker,
    report_diagnostic,
};
use std::rc::Rc;

/// `post` ( msg target -- ): append a message to a mailbox
pub fn post(_env: &Env, mut stack: Stack) -> SlangResult<Stack> {
    let mailbox = match stack.peek("post", 0)? {
        Value::Process(p) => p.mailbox().clone(),
        Value::Mailbox(m) => m.clone(),
        other => return Err(SlangError::type_mismatch("post", Kind::Process, other.kind())),
    };
    stack.require("post", 2)?;
    stack.drop_n("post", 1)?;
    let message = stack.pop("post")?;

    deliver(&mailbox, message);
    Ok(stack)
}

/// Queue `message`, waking the pending receiver if there is one
pub fn deliver(mailbox: &Rc<Mailbox>, message: Value) {
    scheduler::message_posted();
    tracing::trace!(owner = mailbox.owner(), queued = mailbox.len() + 1, "post");

    let Some(receiver) = mailbox.post(message) else {
        return;
    };
    let mailbox = mailbox.clone();
    later(move || match mailbox.take() {
        Some(message) => receiver(message),
        None => {
            // Another turn drained the queue first; go back to waiting.
            if mailbox.wait(receiver).is_err() {
                report_diagnostic(format!(
                    "mailbox {}: woken receiver displaced by another",
                    mailbox.owner()
                ));
            }
        }
    });
}

/// `receive` ( -- msg ): take the next message for the owning process
pub fn receive(_env: &Env, stack: Stack, k: Continuation) {
    let Some(owner) = stack.owner().cloned() else {
        let e = SlangError::NoOwningProcess {
            op: "receive".to_string(),
        };
        return resume_later(k, Err(e));
    };
    let mailbox = owner.mailbox().clone();

    if let Some(message) = mailbox.take() {
        scheduler::message_received();
        return resume_later(k, Ok(stack.with(message)));
    }
    if mailbox.has_receiver() {
        return resume_later(k, Err(SlangError::ReceiverPending { pid: owner.id() }));
    }

    tracing::trace!(pid = owner.id(), "receive: waiting");
    let parked_in = scheduler::epoch();
    let inbox = Rc::downgrade(&mailbox);
    let waker: Waker = Box::new(move |message| {
        if scheduler::is_abandoned(parked_in) {
            tracing::debug!(epoch = parked_in, "dropping receive from an abandoned evaluation");
            if let Some(inbox) = inbox.upgrade() {
                inbox.requeue(message);
            }
            return;
        }
        scheduler::message_received();
        k.resume(Ok(stack.with(message)));
    });
    if mailbox.wait(waker).is_err() {
        report_diagnostic(format!("receive: process {} lost its receiver", owner.id()));
    }
}

/// `mailbox` ( -- mailbox ): the owning process's mailbox
pub fn own_mailbox(_env: &Env, stack: Stack) -> SlangResult<Stack> {
    let mailbox = match stack.owner() {
        Some(owner) => owner.mailbox().clone(),
        None => {
            return Err(SlangError::NoOwningProcess {
                op: "mailbox".to_string(),
            });
        }
    };
    Ok(stack.with(Value::Mailbox(mailbox)))
}

#[cfg(test)]
mod tests {
    use crate::Interpreter;
    use slang_core::{SlangError, Value};

    #[test]
    fn test_receive_outside_process_fails() {
        let err = Interpreter::new().eval("receive").unwrap_err();
        assert_eq!(
            err,
            SlangError::NoOwningProcess {
                op: "receive".to_string()
            }
        );
    }

    #[test]
    fn test_post_then_receive_in_order() {
        let source = "
            [ drop drop receive receive receive ] go :p def
            1 p post  2 p post  3 p post
            p await
        ";
        let stack = Interpreter::new().eval(source).unwrap();
        assert_eq!(stack.into_values(), vec![Value::Number(3.0)]);
    }

    #[test]
    fn test_messages_queue_before_receiver_starts() {
        let source = "
            [ drop drop receive receive swap - ] go :p def
            10 p post  4 p post
            p await
        ";
        let stack = Interpreter::new().eval(source).unwrap();
        assert_eq!(stack.into_values(), vec![Value::Number(-6.0)]);
    }

    #[test]
    fn test_post_to_mailbox_value() {
        let source = "
            [ drop drop mailbox :mb def  :hello mb post  receive ] go await
        ";
        let stack = Interpreter::new().eval(source).unwrap();
        assert_eq!(stack.into_values(), vec![Value::symbol("hello")]);
    }

    #[test]
    fn test_post_rejects_non_process() {
        let err = Interpreter::new().eval("1 2 post").unwrap_err();
        assert!(matches!(err, SlangError::TypeMismatch { .. }));
    }
}
