use super::{ClassData, MethodData, MonitorRef, NativeMethod, ObjectRef, Value};
use crate::jvm::Error;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ThreadId(pub u64);

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ThreadStatus {
    New,
    Runnable,

    /// Waiting on a monitor or on another thread's class initialization
    Blocked,

    /// In `Object.wait()` or waiting for a native module to finish loading
    Waiting,
    TimedWaiting,
    Terminated,
}

/// Part of a thread which other threads (and monitors) may hold on to
#[derive(Debug)]
pub struct ThreadShared {
    id: ThreadId,
    name: String,
    status: Cell<ThreadStatus>,
}

pub type ThreadHandle = Rc<ThreadShared>;

impl ThreadShared {
    pub fn new(id: ThreadId, name: String) -> ThreadHandle {
        Rc::new(ThreadShared {
            id,
            name,
            status: Cell::new(ThreadStatus::New),
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ThreadStatus {
        self.status.get()
    }

    pub fn set_status(&self, status: ThreadStatus) {
        log::trace!("Thread {:?} is now {:?}", self.name, status);
        self.status.set(status);
    }
}

/// One activation record
pub struct StackFrame<'g> {
    pub method: &'g MethodData<'g>,
    pub pc: usize,
    pub operand_stack: Vec<Value<'g>>,
    pub locals: Vec<Value<'g>>,
    max_stack: usize,

    /// Handler to call while this frame is on top (only for native methods)
    pub native: Option<NativeMethod>,

    /// Monitor to release when the frame is popped (synchronized methods)
    pub monitor: Option<MonitorRef>,

    /// Set on `<clinit>` frames pushed by class initialization
    pub initializing: Option<&'g ClassData<'g>>,

    /// Where the caller continues after a normal return
    ///
    /// When absent, the caller's pc is left alone and the instruction which pushed this frame
    /// runs again (this is how class initialization resumes the triggering instruction).
    pub return_pc: Option<usize>,
}

impl<'g> StackFrame<'g> {
    /// Frame with `args` copied into the low local slots (category 2 values take two slots)
    pub fn new(method: &'g MethodData<'g>, args: Vec<Value<'g>>) -> StackFrame<'g> {
        let (max_stack, max_locals) = match &method.code {
            Some(code) => (code.max_stack as usize, code.max_locals as usize),
            None => (2, 0),
        };

        let mut locals = Vec::with_capacity(max_locals);
        for arg in args {
            let wide = arg.is_wide();
            locals.push(arg);
            if wide {
                locals.push(Value::Top);
            }
        }
        if locals.len() < max_locals {
            locals.resize(max_locals, Value::Top);
        }

        StackFrame {
            method,
            pc: 0,
            operand_stack: Vec::with_capacity(max_stack),
            locals,
            max_stack,
            native: None,
            monitor: None,
            initializing: None,
            return_pc: None,
        }
    }

    pub fn class(&self) -> &'g ClassData<'g> {
        self.method.class
    }

    /// Push a value, taking two slots if it is category 2
    pub fn push(&mut self, value: Value<'g>) -> Result<(), Error> {
        if value.is_wide() {
            self.push_slot(value)?;
            self.push_slot(Value::Top)
        } else {
            self.push_slot(value)
        }
    }

    /// Push exactly one raw slot
    pub fn push_slot(&mut self, value: Value<'g>) -> Result<(), Error> {
        if self.operand_stack.len() >= self.max_stack {
            return Err(Error::Internal(format!(
                "Operand stack overflow in {} (max stack {})",
                self.method, self.max_stack
            )));
        }
        self.operand_stack.push(value);
        Ok(())
    }

    /// Pop one value, taking both slots if it is category 2
    pub fn pop(&mut self) -> Result<Value<'g>, Error> {
        match self.pop_slot()? {
            Value::Top => match self.pop_slot()? {
                wide if wide.is_wide() => Ok(wide),
                other => Err(Error::Internal(format!(
                    "Top slot on the operand stack above non-wide {:?}",
                    other
                ))),
            },
            value if value.is_wide() => Err(Error::Internal(format!(
                "Category 2 value {:?} is missing its top slot",
                value
            ))),
            value => Ok(value),
        }
    }

    /// Pop exactly one raw slot
    pub fn pop_slot(&mut self) -> Result<Value<'g>, Error> {
        self.operand_stack
            .pop()
            .ok_or_else(|| Error::Internal(format!("Operand stack underflow in {}", self.method)))
    }

    /// Raw slot `depth` slots below the top of the stack (0 is the top)
    pub fn peek_slot(&self, depth: usize) -> Result<&Value<'g>, Error> {
        let len = self.operand_stack.len();
        if depth >= len {
            return Err(Error::Internal(format!(
                "Peeking {} slots deep into a stack of {}",
                depth, len
            )));
        }
        Ok(&self.operand_stack[len - 1 - depth])
    }

    pub fn pop_int(&mut self) -> Result<i32, Error> {
        self.pop()?.as_int()
    }

    pub fn pop_long(&mut self) -> Result<i64, Error> {
        self.pop()?.as_long()
    }

    pub fn pop_float(&mut self) -> Result<f32, Error> {
        self.pop()?.as_float()
    }

    pub fn pop_double(&mut self) -> Result<f64, Error> {
        self.pop()?.as_double()
    }

    pub fn pop_reference(&mut self) -> Result<Option<ObjectRef<'g>>, Error> {
        self.pop()?.as_reference()
    }

    /// Read a local (a category 2 value is read from its first slot)
    pub fn load(&self, index: usize) -> Result<Value<'g>, Error> {
        match self.locals.get(index) {
            Some(Value::Top) | None => Err(Error::Internal(format!(
                "Local {} of {} is unset or out of range",
                index, self.method
            ))),
            Some(value) => Ok(value.clone()),
        }
    }

    /// Write a local, invalidating any category 2 value that gets partially overwritten
    pub fn store(&mut self, index: usize, value: Value<'g>) -> Result<(), Error> {
        let width = if value.is_wide() { 2 } else { 1 };
        if index + width > self.locals.len() {
            return Err(Error::Internal(format!(
                "Local {} out of range in {} (max locals {})",
                index,
                self.method,
                self.locals.len()
            )));
        }
        if index > 0 && self.locals[index - 1].is_wide() {
            self.locals[index - 1] = Value::Top;
        }
        if width == 1 && self.locals[index].is_wide() {
            if let Some(next) = self.locals.get_mut(index + 1) {
                *next = Value::Top;
            }
        }
        if width == 2 {
            if self.locals[index + 1].is_wide() {
                if let Some(next) = self.locals.get_mut(index + 2) {
                    *next = Value::Top;
                }
            }
            self.locals[index + 1] = Value::Top;
        }
        self.locals[index] = value;
        Ok(())
    }
}

/// Logical thread of execution: a call stack plus some bookkeeping
pub struct Thread<'g> {
    shared: ThreadHandle,
    frames: Vec<StackFrame<'g>>,

    /// Exception which emptied the call stack, if any
    uncaught: Option<ObjectRef<'g>>,

    /// Value returned by the last frame to be popped off an otherwise empty stack
    completed: Option<Option<Value<'g>>>,
}

impl<'g> Thread<'g> {
    pub fn new(id: ThreadId, name: String) -> Thread<'g> {
        Thread {
            shared: ThreadShared::new(id, name),
            frames: vec![],
            uncaught: None,
            completed: None,
        }
    }

    pub fn handle(&self) -> &ThreadHandle {
        &self.shared
    }

    pub fn id(&self) -> ThreadId {
        self.shared.id()
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    pub fn status(&self) -> ThreadStatus {
        self.shared.status()
    }

    pub fn set_status(&self, status: ThreadStatus) {
        self.shared.set_status(status)
    }

    /// Number of frames on the call stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[StackFrame<'g>] {
        &self.frames
    }

    pub fn frame(&self) -> Result<&StackFrame<'g>, Error> {
        self.frames
            .last()
            .ok_or_else(|| Error::Internal(format!("Thread {:?} has no frames", self.name())))
    }

    pub fn frame_mut(&mut self) -> Result<&mut StackFrame<'g>, Error> {
        let name = self.shared.name();
        self.frames
            .last_mut()
            .ok_or_else(|| Error::Internal(format!("Thread {:?} has no frames", name)))
    }

    /// Push a frame for `method` with the given arguments (one value per parameter)
    pub fn invoke(&mut self, method: &'g MethodData<'g>, args: Vec<Value<'g>>) -> Result<(), Error> {
        self.push_frame(StackFrame::new(method, args))
    }

    pub fn push_frame(&mut self, frame: StackFrame<'g>) -> Result<(), Error> {
        log::trace!("Thread {:?} enters {}", self.name(), frame.method);
        if self.frames.is_empty() {
            self.completed = None;
            self.uncaught = None;
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the top frame without any of the bookkeeping of a return (`None` if the stack is
    /// already empty)
    pub fn pop_frame(&mut self) -> Option<StackFrame<'g>> {
        self.frames.pop()
    }

    pub fn pc(&self) -> Result<usize, Error> {
        self.frame().map(|frame| frame.pc)
    }

    pub fn set_pc(&mut self, pc: usize) -> Result<(), Error> {
        self.frame_mut()?.pc = pc;
        Ok(())
    }

    pub fn offset_pc(&mut self, offset: isize) -> Result<(), Error> {
        let frame = self.frame_mut()?;
        frame.pc = frame
            .pc
            .checked_add_signed(offset)
            .ok_or_else(|| Error::Internal(format!("Branch offset {} before code start", offset)))?;
        Ok(())
    }

    pub fn push(&mut self, value: Value<'g>) -> Result<(), Error> {
        self.frame_mut()?.push(value)
    }

    pub fn pop(&mut self) -> Result<Value<'g>, Error> {
        self.frame_mut()?.pop()
    }

    /// Pop a category 2 value
    pub fn pop64(&mut self) -> Result<Value<'g>, Error> {
        match self.pop()? {
            wide if wide.is_wide() => Ok(wide),
            other => Err(Error::Internal(format!("Expected long or double, found {:?}", other))),
        }
    }

    /// Local of the top frame (for natives, these are the arguments)
    pub fn local(&self, index: usize) -> Result<Value<'g>, Error> {
        self.frame()?.load(index)
    }

    /// Return from the current frame, pushing `value` onto the caller's stack
    pub fn return_value(&mut self, value: Value<'g>) -> Result<(), Error> {
        self.return_with(Some(value))
    }

    /// Return a `long` or `double` from the current frame
    pub fn return_value64(&mut self, value: Value<'g>) -> Result<(), Error> {
        if !value.is_wide() {
            return Err(Error::Internal(format!(
                "Expected long or double return, found {:?}",
                value
            )));
        }
        self.return_with(Some(value))
    }

    pub fn return_void(&mut self) -> Result<(), Error> {
        self.return_with(None)
    }

    fn return_with(&mut self, value: Option<Value<'g>>) -> Result<(), Error> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::Internal(format!("Return with no frame on {:?}", self.name())))?;
        self.release_frame(&frame);
        if let Some(class) = frame.initializing {
            class.finish_initialization();
        }

        match self.frames.last_mut() {
            Some(caller) => {
                if let Some(return_pc) = frame.return_pc {
                    caller.pc = return_pc;
                }
                if let Some(value) = value {
                    caller.push(value)?;
                }
            }
            None => {
                self.completed = Some(value);
                self.set_status(ThreadStatus::Terminated);
            }
        }
        Ok(())
    }

    /// Whether the top frame is synchronized on a monitor this thread no longer owns
    pub(crate) fn lost_frame_monitor(&self) -> Result<bool, Error> {
        Ok(match &self.frame()?.monitor {
            Some(monitor) => !monitor.borrow().is_owned_by(&self.shared),
            None => false,
        })
    }

    /// Release the monitor of a synchronized frame
    ///
    /// Returns check ownership beforehand, so a monitor can only be missing here while an
    /// exception unwinds the frame.
    pub(crate) fn release_frame(&self, frame: &StackFrame<'g>) {
        if let Some(monitor) = &frame.monitor {
            if monitor.borrow_mut().exit(&self.shared).is_err() {
                log::debug!(
                    "Thread {:?} unwound synchronized {} without owning its monitor",
                    self.name(),
                    frame.method
                );
            }
        }
    }

    /// Record the exception which emptied the call stack
    pub(crate) fn terminate_with(&mut self, exception: ObjectRef<'g>) {
        self.frames.clear();
        self.uncaught = Some(exception);
        self.set_status(ThreadStatus::Terminated);
    }

    pub fn uncaught_exception(&self) -> Option<&ObjectRef<'g>> {
        self.uncaught.as_ref()
    }

    /// Value the bottom frame returned with (`Some(None)` for `void`)
    pub fn completion(&self) -> Option<&Option<Value<'g>>> {
        self.completed.as_ref()
    }
}

impl<'g> fmt::Debug for Thread<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("status", &self.status())
            .field("depth", &self.depth())
            .finish()
    }
}
