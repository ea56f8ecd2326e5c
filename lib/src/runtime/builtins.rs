//! Natives of `java/lang/Object`, which the runtime itself has to provide

use super::{NativeModule, NativeRegistry, NotOwner, ObjectRef, Runtime, Thread, Value};
use crate::jvm::{BinaryName, Error, Name};
use std::time::{Duration, Instant};

pub(crate) fn register(natives: &NativeRegistry) {
    natives.register_module(
        NativeModule::new(BinaryName::OBJECT.as_str())
            .with("registerNatives()V", register_natives)
            .with("hashCode()I", hash_code)
            .with("getClass()Ljava/lang/Class;", get_class)
            .with("clone()Ljava/lang/Object;", clone)
            .with("wait(J)V", wait)
            .with("notify()V", notify)
            .with("notifyAll()V", notify_all),
    );
}

fn receiver<'g>(thread: &Thread<'g>) -> Result<ObjectRef<'g>, Error> {
    thread
        .local(0)?
        .as_reference()?
        .ok_or_else(|| Error::Internal(String::from("Native called on a null receiver")))
}

fn register_natives<'g>(_: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    thread.return_void()
}

fn hash_code<'g>(_: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    thread.return_value(Value::Int(this.identity_hash()))
}

fn get_class<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    let mirror = runtime.mirror(this.class)?;
    thread.return_value(Value::Object(mirror))
}

fn clone<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    if this.is_array() || this.class.has_supertype_named(&BinaryName::CLONEABLE) {
        thread.return_value(Value::Object(this.shallow_clone()))
    } else {
        let message = this.class.name.to_string();
        runtime.throw_new(thread, &BinaryName::CLONENOTSUPPORTEDEXCEPTION, Some(&message))
    }
}

fn not_owner<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    runtime.throw_new(
        thread,
        &BinaryName::ILLEGALMONITORSTATEEXCEPTION,
        Some("current thread is not owner"),
    )
}

fn wait<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    let timeout = thread.local(1)?.as_long()?;
    if timeout < 0 {
        return runtime.throw_new(
            thread,
            &BinaryName::ILLEGALARGUMENTEXCEPTION,
            Some("timeout value is negative"),
        );
    }

    // A timeout of zero means waiting until notified
    let deadline = if timeout == 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_millis(timeout as u64))
    };
    let monitor = this.monitor();
    let waited = monitor.borrow_mut().wait(thread.handle(), deadline);
    match waited {
        Err(NotOwner) => not_owner(runtime, thread),
        Ok(()) => {
            if deadline.is_some() {
                runtime.track_timed_wait(monitor);
            }
            thread.return_void()
        }
    }
}

fn notify<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    let notified = this.monitor().borrow_mut().notify(thread.handle());
    match notified {
        Err(NotOwner) => not_owner(runtime, thread),
        Ok(()) => thread.return_void(),
    }
}

fn notify_all<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let this = receiver(thread)?;
    let notified = this.monitor().borrow_mut().notify_all(thread.handle());
    match notified {
        Err(NotOwner) => not_owner(runtime, thread),
        Ok(()) => thread.return_void(),
    }
}
