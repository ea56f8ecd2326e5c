//! Loading, linking, and running classes
//!
//! Everything here hangs off of a [`Runtime`], which owns the loaders, the interned strings, the
//! native method registry, and the scheduler. Classes (and their members) are allocated in
//! [`ClassArenas`] which must outlive the runtime:
//!
//! ```
//! use mocha::jvm::class_file::{BytecodeWriter, ClassBuilder};
//! use mocha::jvm::*;
//! use mocha::runtime::*;
//!
//! # fn run() -> Result<(), Error> {
//! let object = ClassBuilder::new("java/lang/Object", None, ClassAccessFlags::PUBLIC)?;
//! let mut answer = ClassBuilder::new(
//!     "Answer",
//!     Some("java/lang/Object"),
//!     ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
//! )?;
//! let mut code = BytecodeWriter::new();
//! code.op(opcode::BIPUSH).i8(42).op(opcode::IRETURN);
//! answer.add_method(
//!     MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
//!     "get",
//!     "()I",
//!     Some(code.into_code(1, 0)),
//! )?;
//!
//! let boot = MemorySource::new().with("java/lang/Object", object.into_bytes()?);
//! let app = MemorySource::new().with("Answer", answer.into_bytes()?);
//!
//! let arenas = ClassArenas::new();
//! let runtime = Runtime::new(&arenas, Settings::default(), Box::new(boot), Box::new(app));
//! let class = runtime.load_class("Answer")?;
//! let mut thread = runtime.new_thread("main");
//! match runtime.call_static(&mut thread, class, "get", "()I", vec![])? {
//!     Completion::Returned(Some(Value::Int(answer))) => assert_eq!(answer, 42),
//!     _ => panic!("unexpected completion"),
//! }
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

mod builtins;
mod class;
mod constant_pool;
mod exceptions;
mod init;
mod loader;
mod monitor;
mod natives;
mod object;
mod scheduler;
mod settings;
mod strings;
mod thread;
mod value;

pub use class::*;
pub use constant_pool::*;
pub use init::*;
pub use loader::*;
pub use monitor::*;
pub use natives::*;
pub use object::*;
pub use scheduler::*;
pub use settings::*;
pub use thread::*;
pub use value::*;

use crate::interpreter;
use crate::jvm::class_file::ConstantIndex;
use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Hook called when an exception unwinds the whole call stack of a thread
pub trait UncaughtExceptionHandler {
    fn uncaught_exception<'g>(
        &self,
        runtime: &Runtime<'g>,
        thread: &Thread<'g>,
        exception: &ObjectRef<'g>,
    );
}

/// Default uncaught exception hook: log the exception
pub struct LogUncaught;

impl UncaughtExceptionHandler for LogUncaught {
    fn uncaught_exception<'g>(
        &self,
        runtime: &Runtime<'g>,
        thread: &Thread<'g>,
        exception: &ObjectRef<'g>,
    ) {
        log::error!(
            "Exception in thread {:?} {}",
            thread.name(),
            runtime.describe_exception(exception)
        );
    }
}

/// `invokedynamic` call site, as seen by a [`CallSiteLinker`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    /// Class declaring the bootstrap method
    pub bootstrap_class: String,
    pub bootstrap_name: String,

    /// Name and descriptor at the call site
    pub name: String,
    pub descriptor: String,
}

/// Static method which a call site gets linked to
///
/// The target must be static and have exactly the descriptor of the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSiteTarget {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

/// Host-side replacement for bootstrap methods
pub trait CallSiteLinker {
    /// Pick a target for the call site (or `None` if this linker doesn't know the bootstrap)
    fn link(&self, call_site: &CallSite) -> Option<CallSiteTarget>;
}

/// How a host-driven call ended
#[derive(Debug)]
pub enum Completion<'g> {
    /// Normal return, with the value if the method isn't `void`
    Returned(Option<Value<'g>>),

    /// Uncaught exception
    Threw(ObjectRef<'g>),
}

pub struct Runtime<'g> {
    bootstrap: &'g ClassLoader<'g>,
    application: &'g ClassLoader<'g>,
    pub settings: Settings,

    /// Interned strings, by text
    strings: RefCell<HashMap<Rc<str>, ObjectRef<'g>>>,
    natives: NativeRegistry,
    scheduler: Scheduler<'g>,
    uncaught_handler: Box<dyn UncaughtExceptionHandler>,
    linker: Option<Box<dyn CallSiteLinker>>,
    next_thread_id: Cell<u64>,

    /// Monitors which may have timed waiters
    timed_waits: RefCell<Vec<MonitorRef>>,
}

impl<'g> Runtime<'g> {
    /// Create a runtime with a bootstrap loader and an application loader delegating to it
    pub fn new(
        arenas: &'g ClassArenas<'g>,
        settings: Settings,
        bootstrap_source: Box<dyn ClassSource>,
        application_source: Box<dyn ClassSource>,
    ) -> Runtime<'g> {
        let bootstrap = arenas.add_loader("bootstrap", None, bootstrap_source);
        let application = arenas.add_loader("application", Some(bootstrap), application_source);
        let natives = NativeRegistry::new();
        builtins::register(&natives);
        Runtime {
            bootstrap,
            application,
            settings,
            strings: RefCell::new(HashMap::new()),
            natives,
            scheduler: Scheduler::new(),
            uncaught_handler: Box::new(LogUncaught),
            linker: None,
            next_thread_id: Cell::new(1),
            timed_waits: RefCell::new(vec![]),
        }
    }

    pub fn set_uncaught_handler(&mut self, handler: Box<dyn UncaughtExceptionHandler>) {
        self.uncaught_handler = handler;
    }

    pub fn set_call_site_linker(&mut self, linker: Box<dyn CallSiteLinker>) {
        self.linker = Some(linker);
    }

    pub fn bootstrap_loader(&self) -> &'g ClassLoader<'g> {
        self.bootstrap
    }

    pub fn application_loader(&self) -> &'g ClassLoader<'g> {
        self.application
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Load a class through the application loader
    pub fn load_class(&self, name: &str) -> Result<&'g ClassData<'g>, Error> {
        self.application.load_class(name)
    }

    /// Create a thread (in the `New` state, with an empty call stack)
    pub fn new_thread(&self, name: &str) -> Thread<'g> {
        let id = self.next_thread_id.get();
        self.next_thread_id.set(id + 1);
        Thread::new(ThreadId(id), name.to_owned())
    }

    /// Hand a thread over to the scheduler
    pub fn spawn(&self, thread: Thread<'g>) {
        thread.set_status(ThreadStatus::Runnable);
        self.scheduler.push(thread);
    }

    /// Start a new scheduled thread running a static method
    ///
    /// The class is initialized on the new thread before this returns.
    pub fn spawn_call(
        &self,
        name: &str,
        class: &'g ClassData<'g>,
        method_name: &str,
        descriptor: &str,
        args: Vec<Value<'g>>,
    ) -> Result<ThreadId, Error> {
        let mut thread = self.new_thread(name);
        let id = thread.id();
        let method = Self::static_method(class, method_name, descriptor)?;
        if self.enter_static(&mut thread, method, args)?.is_some() {
            self.scheduler.requeue(thread);
        } else {
            self.scheduler.push(thread);
        }
        Ok(id)
    }

    /// Collect a scheduled thread which has terminated
    pub fn take_finished(&self, id: ThreadId) -> Option<Thread<'g>> {
        self.scheduler.take_finished(id)
    }

    /// Run scheduled threads until all of them have terminated
    pub fn run(&self) -> Result<(), Error> {
        loop {
            self.poll_events();
            match self.scheduler.take_runnable() {
                Some(mut thread) => {
                    let result = interpreter::run_for(self, &mut thread, self.settings.quantum);
                    self.scheduler.requeue(thread);
                    result?;
                }
                None if self.scheduler.is_empty() => return Ok(()),
                None => self.wait_for_progress(None)?,
            }
        }
    }

    /// Run `public static void main(String[])` of a class on a new main thread, then every other
    /// thread until they all finish
    pub fn run_main(&self, class_name: &str, args: &[String]) -> Result<Completion<'g>, Error> {
        let class = self.load_class(class_name)?;
        let string_array = self.bootstrap.load_class("[Ljava/lang/String;")?;
        let mut strings = Vec::with_capacity(args.len());
        for arg in args {
            strings.push(Some(self.new_string(arg)?));
        }
        let args = Object::new_array(string_array, ArrayData::Reference(strings));

        let mut thread = self.new_thread(&self.settings.main_thread_name);
        let completion = self.call_static(
            &mut thread,
            class,
            UnqualifiedName::MAIN.as_str(),
            "([Ljava/lang/String;)V",
            vec![Value::Object(args)],
        )?;
        self.run()?;
        Ok(completion)
    }

    /// Call a static method on a host-driven thread and run it to completion
    ///
    /// The thread must have an empty call stack. While it is blocked, scheduled threads run.
    pub fn call_static(
        &self,
        thread: &mut Thread<'g>,
        class: &'g ClassData<'g>,
        name: &str,
        descriptor: &str,
        args: Vec<Value<'g>>,
    ) -> Result<Completion<'g>, Error> {
        if thread.depth() != 0 {
            return Err(Error::Internal(format!(
                "Thread {:?} is already running bytecode",
                thread.name()
            )));
        }
        let method = Self::static_method(class, name, descriptor)?;
        if let Some(completion) = self.enter_static(thread, method, args)? {
            return Ok(completion);
        }
        self.drive(thread)?;
        self.completion_of(thread)
    }

    /// Initialize a class on a host-driven thread (with an empty call stack)
    pub fn initialize_class(
        &self,
        thread: &mut Thread<'g>,
        class: &'g ClassData<'g>,
    ) -> Result<Completion<'g>, Error> {
        if thread.depth() != 0 {
            return Err(Error::Internal(format!(
                "Thread {:?} is already running bytecode",
                thread.name()
            )));
        }
        thread.set_status(ThreadStatus::Runnable);
        loop {
            match ensure_initialized(self, thread, class)? {
                InitProgress::Ready => return Ok(Completion::Returned(None)),
                InitProgress::Pushed => {
                    self.drive(thread)?;
                    if let Some(exception) = thread.uncaught_exception() {
                        return Ok(Completion::Threw(exception.clone()));
                    }
                    thread.set_status(ThreadStatus::Runnable);
                }
                InitProgress::Blocked => self.wait_until_runnable(thread)?,
                InitProgress::Thrown => return self.completion_of(thread),
            }
        }
    }

    fn static_method(
        class: &'g ClassData<'g>,
        name: &str,
        descriptor: &str,
    ) -> Result<&'g MethodData<'g>, Error> {
        let method = if class.is_interface() {
            class
                .find_method(name, descriptor)
                .ok_or_else(|| Error::NoSuchMethod(format!("{}.{}{}", class.name, name, descriptor)))?
        } else {
            class.resolve_method(name, descriptor)?
        };
        if method.is_static() {
            Ok(method)
        } else {
            Err(Error::IncompatibleClassChange(format!(
                "Expected static method {}",
                method
            )))
        }
    }

    /// Initialize the class of a static method and push its frame
    ///
    /// Returns a completion if the thread terminated before the method could start.
    fn enter_static(
        &self,
        thread: &mut Thread<'g>,
        method: &'g MethodData<'g>,
        args: Vec<Value<'g>>,
    ) -> Result<Option<Completion<'g>>, Error> {
        if let Completion::Threw(exception) = self.initialize_class(thread, method.class)? {
            return Ok(Some(Completion::Threw(exception)));
        }
        thread.set_status(ThreadStatus::Runnable);

        let native = if method.is_native() {
            loop {
                match self.native_for(thread, method) {
                    NativeLookup::Found(native) => break Some(native),
                    NativeLookup::Pending => self.wait_until_runnable(thread)?,
                    NativeLookup::Missing => {
                        let message = method.to_string();
                        self.throw_new(thread, &BinaryName::UNSATISFIEDLINKERROR, Some(&message))?;
                        return self.completion_of(thread).map(Some);
                    }
                }
            }
        } else {
            None
        };

        self.invoke_method(thread, method, args, native, None)?;
        if thread.depth() == 0 {
            return self.completion_of(thread).map(Some);
        }
        Ok(None)
    }

    /// Outcome of a thread whose call stack has emptied
    pub fn completion_of(&self, thread: &Thread<'g>) -> Result<Completion<'g>, Error> {
        if let Some(exception) = thread.uncaught_exception() {
            return Ok(Completion::Threw(exception.clone()));
        }
        match thread.completion() {
            Some(value) => Ok(Completion::Returned(value.clone())),
            None => Err(Error::Internal(format!(
                "Thread {:?} has not finished",
                thread.name()
            ))),
        }
    }

    /// Run a host-driven thread until its call stack empties
    ///
    /// Whenever the thread can't make progress, scheduled threads run instead.
    fn drive(&self, thread: &mut Thread<'g>) -> Result<(), Error> {
        while thread.depth() > 0 && thread.status() != ThreadStatus::Terminated {
            if thread.status() == ThreadStatus::Runnable {
                interpreter::run_for(self, thread, self.settings.quantum)?;
            } else {
                self.wait_until_runnable(thread)?;
            }
        }
        Ok(())
    }

    /// Run other threads (or wait for external events) until a host-driven thread is runnable
    fn wait_until_runnable(&self, thread: &Thread<'g>) -> Result<(), Error> {
        loop {
            match thread.status() {
                ThreadStatus::Runnable | ThreadStatus::Terminated => return Ok(()),
                _ => (),
            }
            self.poll_events();
            if thread.status() == ThreadStatus::Runnable {
                return Ok(());
            }
            match self.scheduler.take_runnable() {
                Some(mut other) => {
                    let result = interpreter::run_for(self, &mut other, self.settings.quantum);
                    self.scheduler.requeue(other);
                    result?;
                }
                None => self.wait_for_progress(Some(thread))?,
            }
        }
    }

    /// Deliver finished native modules and expired timed waits
    fn poll_events(&self) {
        let woken: Vec<ThreadId> = self
            .natives
            .poll()
            .iter()
            .map(|thread| thread.id())
            .collect();
        self.scheduler.move_to_back(&woken);

        let now = Instant::now();
        self.timed_waits.borrow_mut().retain(|monitor| {
            let mut monitor = monitor.borrow_mut();
            monitor.expire_waits(now);
            monitor.next_deadline().is_some()
        });
    }

    /// Block the host until something external could make a thread runnable
    fn wait_for_progress(&self, host_thread: Option<&Thread<'g>>) -> Result<(), Error> {
        let deadline = self
            .timed_waits
            .borrow()
            .iter()
            .filter_map(|monitor| monitor.borrow().next_deadline())
            .min();
        let timeout = deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));

        if self.natives.has_pending() {
            self.natives.wait_for_any(timeout);
            Ok(())
        } else if let Some(timeout) = timeout {
            log::trace!("Sleeping {:?} until the next timed wait expires", timeout);
            std::thread::sleep(timeout.max(Duration::from_millis(1)));
            Ok(())
        } else {
            let mut stuck = self.scheduler.stuck_thread_names();
            if let Some(thread) = host_thread {
                stuck.push(format!("{} ({:?})", thread.name(), thread.status()));
            }
            Err(Error::Deadlock(stuck))
        }
    }

    /// Remember a monitor which has a timed waiter, so that the wait can expire
    pub(crate) fn track_timed_wait(&self, monitor: MonitorRef) {
        let mut timed_waits = self.timed_waits.borrow_mut();
        if !timed_waits.iter().any(|tracked| Rc::ptr_eq(tracked, &monitor)) {
            timed_waits.push(monitor);
        }
    }

    /// Push a frame for a method whose arguments are already popped
    ///
    /// `return_pc` is where the caller resumes once this frame returns normally.
    pub fn invoke_method(
        &self,
        thread: &mut Thread<'g>,
        method: &'g MethodData<'g>,
        args: Vec<Value<'g>>,
        native: Option<NativeMethod>,
        return_pc: Option<usize>,
    ) -> Result<(), Error> {
        if thread.depth() >= self.settings.max_call_depth {
            return self.throw_new(thread, &BinaryName::STACKOVERFLOWERROR, None);
        }
        if method.is_abstract() {
            let message = method.to_string();
            return self.throw_new(thread, &BinaryName::ABSTRACTMETHODERROR, Some(&message));
        }

        let mut frame = StackFrame::new(method, args);
        frame.native = native;
        frame.return_pc = return_pc;
        if method.is_synchronized() {
            let monitor = if method.is_static() {
                method.class.monitor()
            } else {
                match frame.load(0)?.as_reference()? {
                    Some(receiver) => receiver.monitor(),
                    None => return Err(Error::Internal(format!("Null receiver for {}", method))),
                }
            };
            monitor.borrow_mut().enter(thread.handle());
            frame.monitor = Some(monitor);
        }
        thread.push_frame(frame)
    }

    /// Find the native implementation of a method
    ///
    /// If the native module is still loading, the thread starts waiting on it.
    pub fn native_for(&self, thread: &Thread<'g>, method: &'g MethodData<'g>) -> NativeLookup {
        let name_and_descriptor = format!("{}{}", method.name.as_str(), method.descriptor_text());
        self.natives
            .lookup(method.class.name.as_str(), &name_and_descriptor, thread.handle())
    }

    /// Canonical `java/lang/Class` instance for a class
    pub fn mirror(&self, class: &'g ClassData<'g>) -> Result<ObjectRef<'g>, Error> {
        if let Some(mirror) = class.mirror.get() {
            return Ok(mirror.clone());
        }
        let class_class = self.bootstrap.load_class(BinaryName::CLASS.as_str())?;
        let mirror = Object::new_instance(class_class);
        mirror.set_native("class", NativeValue::Class(class));

        // `synchronized static` methods and `synchronized (X.class)` share a monitor
        mirror.adopt_monitor(class.monitor());
        Ok(class.mirror.get_or_init(|| mirror).clone())
    }

    /// Class that a mirror stands for
    pub fn class_of_mirror(&self, mirror: &Object<'g>) -> Option<&'g ClassData<'g>> {
        match mirror.native("class") {
            Some(NativeValue::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// Find (or ask the linker for) the target of an `invokedynamic` call site
    ///
    /// `None` means the call site can't be linked.
    pub(crate) fn link_call_site(
        &self,
        class: &'g ClassData<'g>,
        index: ConstantIndex,
    ) -> Result<Option<&'g MethodData<'g>>, Error> {
        if let Some(method) = class.call_sites.get(&index.0) {
            return Ok(Some(method));
        }
        let (bootstrap_method, name, descriptor) =
            match class.constant_pool.resolve(self, class, index)? {
                RuntimeConstant::InvokeDynamic {
                    bootstrap_method,
                    name,
                    descriptor,
                } => (bootstrap_method, name, descriptor),
                _ => {
                    return Err(Error::Format(format!(
                        "Expected InvokeDynamic at #{}",
                        index.0
                    )))
                }
            };
        let linker = match &self.linker {
            Some(linker) => linker,
            None => return Ok(None),
        };

        let bootstrap = class
            .bootstrap_methods
            .get(bootstrap_method as usize)
            .ok_or_else(|| {
                Error::Format(format!(
                    "Missing bootstrap method {} in {}",
                    bootstrap_method, class.name
                ))
            })?;
        let (bootstrap_class, bootstrap_name, _) = class
            .constant_pool
            .method_handle_target(bootstrap.bootstrap_method)?;
        let call_site = CallSite {
            bootstrap_class: bootstrap_class.to_owned(),
            bootstrap_name: bootstrap_name.to_owned(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        };

        let target = match linker.link(&call_site) {
            Some(target) => target,
            None => return Ok(None),
        };
        let target_class = class.resolve_class(&target.class)?;
        let method = Self::static_method(target_class, &target.name, &target.descriptor)?;
        if method.descriptor_text() != &*descriptor {
            log::warn!(
                "Call site {:?} linked to {} which has the wrong descriptor",
                call_site,
                method
            );
            return Ok(None);
        }
        log::debug!("Linked call site {:?} to {}", call_site, method);
        Ok(Some(class.call_sites.insert(index.0, method)))
    }
}

impl<'g> std::fmt::Debug for Runtime<'g> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("settings", &self.settings)
            .field("strings", &self.strings.borrow().len())
            .finish()
    }
}
