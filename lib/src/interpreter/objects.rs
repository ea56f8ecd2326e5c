use super::{resolve_class, Insn, Next};
use crate::jvm::{BinaryName, Error};
use crate::runtime::{
    ensure_initialized, InitProgress, MonitorEnter, NotOwner, Object, ObjectRef, Runtime, Thread,
    Value,
};

fn pop_non_null<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
) -> Result<Option<ObjectRef<'g>>, Error> {
    match thread.pop()?.as_reference()? {
        Some(object) => Ok(Some(object)),
        None => {
            runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
            Ok(None)
        }
    }
}

/// `new`: allocate an instance (its constructor is a separate `invokespecial`)
pub fn new<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>, insn: Insn<'g>) -> Result<Next, Error> {
    let class = try_guest!(runtime, thread, resolve_class(runtime, thread, insn.u16(1)?));
    if class.is_interface() || class.is_abstract() || class.is_array() || class.is_primitive() {
        let message = class.name.to_string();
        runtime.throw_new(thread, &BinaryName::INSTANTIATIONERROR, Some(&message))?;
        return Ok(Next::Stay);
    }
    if ensure_initialized(runtime, thread, class)? != InitProgress::Ready {
        return Ok(Next::Stay);
    }

    thread.push(Value::Object(Object::new_instance(class)))?;
    Ok(Next::Advance(3))
}

pub fn athrow<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    if let Some(exception) = pop_non_null(runtime, thread)? {
        runtime.throw_exception(thread, exception)?;
    }
    Ok(Next::Stay)
}

/// `checkcast`: `null` always passes
pub fn checkcast<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let class = try_guest!(runtime, thread, resolve_class(runtime, thread, insn.u16(1)?));
    let object = thread.frame()?.peek_slot(0)?.as_reference()?;
    match object {
        Some(object) if !object.class.is_assignable_to(class) => {
            let message = format!(
                "class {} cannot be cast to class {}",
                object.class.name, class.name
            );
            runtime.throw_new(thread, &BinaryName::CLASSCASTEXCEPTION, Some(&message))?;
            Ok(Next::Stay)
        }
        _ => Ok(Next::Advance(3)),
    }
}

pub fn instance_of<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let class = try_guest!(runtime, thread, resolve_class(runtime, thread, insn.u16(1)?));
    let is_instance = match thread.pop()?.as_reference()? {
        Some(object) => object.class.is_assignable_to(class),
        None => false,
    };
    thread.push(Value::Int(is_instance as i32))?;
    Ok(Next::Advance(3))
}

/// `monitorenter`
///
/// When the monitor is contended, the thread blocks with the instruction already retired: the
/// monitor is handed over to it before it runs again.
pub fn monitor_enter<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    let object = match pop_non_null(runtime, thread)? {
        Some(object) => object,
        None => return Ok(Next::Stay),
    };
    let entered = object.monitor().borrow_mut().enter(thread.handle());
    if entered == MonitorEnter::Blocked {
        log::trace!("Thread {:?} blocks on {:?}", thread.name(), object);
    }
    Ok(Next::Advance(1))
}

pub fn monitor_exit<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    let object = match pop_non_null(runtime, thread)? {
        Some(object) => object,
        None => return Ok(Next::Stay),
    };
    let exited = object.monitor().borrow_mut().exit(thread.handle());
    match exited {
        Ok(()) => Ok(Next::Advance(1)),
        Err(NotOwner) => {
            runtime.throw_new(
                thread,
                &BinaryName::ILLEGALMONITORSTATEEXCEPTION,
                Some("current thread is not owner"),
            )?;
            Ok(Next::Stay)
        }
    }
}
