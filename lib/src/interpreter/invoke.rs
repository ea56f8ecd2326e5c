//! Method invocation
//!
//! Invocations never run the callee directly: they pop the arguments, push a frame, and leave
//! the callee to the interpreter loop. The caller's pc only moves past the invoke instruction
//! when the callee returns normally.

use super::{resolve_constant, Insn, Next};
use crate::jvm::class_file::ConstantIndex;
use crate::jvm::{BinaryName, Error};
use crate::runtime::{
    ensure_initialized, InitProgress, MethodData, NativeLookup, ObjectRef, Runtime,
    RuntimeConstant, StackFrame, Thread, Value,
};

fn resolve_method<'g>(
    runtime: &Runtime<'g>,
    thread: &Thread<'g>,
    index: u16,
) -> Result<&'g MethodData<'g>, Error> {
    match resolve_constant(runtime, thread, index)? {
        RuntimeConstant::Method(method) | RuntimeConstant::InterfaceMethod(method) => Ok(method),
        _ => Err(Error::Format(format!(
            "Expected a Methodref or InterfaceMethodref constant at #{}",
            index
        ))),
    }
}

fn incompatible<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    message: String,
) -> Result<Next, Error> {
    runtime.throw_new(
        thread,
        &BinaryName::INCOMPATIBLECLASSCHANGEERROR,
        Some(&message),
    )?;
    Ok(Next::Stay)
}

/// Receiver of an instance method call, still on the operand stack under the arguments
fn peek_receiver<'g>(
    thread: &Thread<'g>,
    method: &MethodData<'g>,
) -> Result<Option<ObjectRef<'g>>, Error> {
    let depth = method.argument_slots() - 1;
    thread.frame()?.peek_slot(depth)?.as_reference()
}

/// Pop the arguments of a method (and its receiver), first argument first
fn pop_arguments<'g>(
    frame: &mut StackFrame<'g>,
    method: &MethodData<'g>,
) -> Result<Vec<Value<'g>>, Error> {
    let count = method.descriptor.parameters.len() + if method.is_static() { 0 } else { 1 };
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(frame.pop()?);
    }
    args.reverse();
    Ok(args)
}

/// Push a frame for the selected method, to return to `return_pc` in the caller
fn invoke<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    method: &'g MethodData<'g>,
    return_pc: usize,
) -> Result<Next, Error> {
    let native = if method.is_native() {
        match runtime.native_for(thread, method) {
            NativeLookup::Found(native) => Some(native),

            // The thread is now waiting on the module, and will run this instruction again
            NativeLookup::Pending => return Ok(Next::Stay),
            NativeLookup::Missing => {
                let message = method.to_string();
                runtime.throw_new(thread, &BinaryName::UNSATISFIEDLINKERROR, Some(&message))?;
                return Ok(Next::Stay);
            }
        }
    } else {
        None
    };

    let args = pop_arguments(thread.frame_mut()?, method)?;
    runtime.invoke_method(thread, method, args, native, Some(return_pc))?;
    Ok(Next::Stay)
}

pub fn invoke_static<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let method = try_guest!(runtime, thread, resolve_method(runtime, thread, insn.u16(1)?));
    if !method.is_static() {
        return incompatible(runtime, thread, format!("Expected static method {}", method));
    }
    if ensure_initialized(runtime, thread, method.class)? != InitProgress::Ready {
        return Ok(Next::Stay);
    }
    invoke(runtime, thread, method, insn.pc + 3)
}

/// `invokevirtual`: dispatch on the class of the receiver
pub fn invoke_virtual<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let resolved = try_guest!(runtime, thread, resolve_method(runtime, thread, insn.u16(1)?));
    if resolved.is_static() {
        return incompatible(runtime, thread, format!("Expected non-static method {}", resolved));
    }
    let receiver = match peek_receiver(thread, resolved)? {
        Some(receiver) => receiver,
        None => {
            runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
            return Ok(Next::Stay);
        }
    };
    let method = try_guest!(runtime, thread, receiver.class.select_method(resolved));
    invoke(runtime, thread, method, insn.pc + 3)
}

/// `invokespecial`: constructors, private methods, and `super` calls
pub fn invoke_special<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let resolved = try_guest!(runtime, thread, resolve_method(runtime, thread, insn.u16(1)?));
    if resolved.is_static() {
        return incompatible(runtime, thread, format!("Expected non-static method {}", resolved));
    }
    if peek_receiver(thread, resolved)?.is_none() {
        runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
        return Ok(Next::Stay);
    }
    let current_class = thread.frame()?.class();
    let method = try_guest!(runtime, thread, current_class.select_special(resolved));
    invoke(runtime, thread, method, insn.pc + 3)
}

/// `invokeinterface`: dispatch on the class of the receiver, which must implement the interface
pub fn invoke_interface<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let resolved = try_guest!(runtime, thread, resolve_method(runtime, thread, insn.u16(1)?));
    if resolved.is_static() {
        return incompatible(runtime, thread, format!("Expected non-static method {}", resolved));
    }
    let receiver = match peek_receiver(thread, resolved)? {
        Some(receiver) => receiver,
        None => {
            runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
            return Ok(Next::Stay);
        }
    };
    if !receiver.class.is_assignable_to(resolved.class) {
        let message = format!(
            "Class {} does not implement the requested interface {}",
            receiver.class.name, resolved.class.name
        );
        return incompatible(runtime, thread, message);
    }
    let method = try_guest!(runtime, thread, receiver.class.select_method(resolved));
    invoke(runtime, thread, method, insn.pc + 5)
}

/// `invokedynamic`: call the static method the host linked the call site to
pub fn invoke_dynamic<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let index = insn.u16(1)?;
    let class = thread.frame()?.class();
    let linked = try_guest!(
        runtime,
        thread,
        runtime.link_call_site(class, ConstantIndex(index))
    );
    let method = match linked {
        Some(method) => method,
        None => {
            let message = format!("Call site #{} in {} could not be linked", index, class.name);
            runtime.throw_new(thread, &BinaryName::BOOTSTRAPMETHODERROR, Some(&message))?;
            return Ok(Next::Stay);
        }
    };
    if ensure_initialized(runtime, thread, method.class)? != InitProgress::Ready {
        return Ok(Next::Stay);
    }
    invoke(runtime, thread, method, insn.pc + 5)
}
