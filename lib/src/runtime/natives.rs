use super::{Runtime, Thread, ThreadHandle, ThreadStatus};
use crate::jvm::Error;
use crossbeam::channel::{self, Receiver, Select, TryRecvError};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Host implementation of a `native` method
///
/// The arguments are in the locals of the top frame of the thread (`thread.local(n)`). Before
/// returning `Ok`, a native must do exactly one of: return through the thread
/// (`return_value`, `return_value64`, `return_void`), throw (`Runtime::throw_new` or
/// `Runtime::throw_exception`), or push further frames it wants to run (in which case it will be
/// called again once they return).
pub type NativeMethod = for<'g> fn(&Runtime<'g>, &mut Thread<'g>) -> Result<(), Error>;

/// Natives for one class, registered together
pub struct NativeModule {
    pub class_name: String,

    /// Pairs of name-and-descriptor (eg. `hashCode()I`) and implementation
    pub methods: Vec<(String, NativeMethod)>,
}

impl NativeModule {
    pub fn new(class_name: impl Into<String>) -> NativeModule {
        NativeModule {
            class_name: class_name.into(),
            methods: vec![],
        }
    }

    pub fn with(mut self, name_and_descriptor: impl Into<String>, method: NativeMethod) -> NativeModule {
        self.methods.push((name_and_descriptor.into(), method));
        self
    }

    /// Build a module on a background host thread
    ///
    /// The returned channel produces the module once it is ready, which is what
    /// `NativeRegistry::register_async` expects.
    pub fn spawn_loader<F>(load: F) -> Receiver<NativeModule>
    where
        F: FnOnce() -> NativeModule + Send + 'static,
    {
        let (sender, receiver) = channel::bounded(1);
        std::thread::spawn(move || {
            let module = load();
            if sender.send(module).is_err() {
                log::warn!("Native module finished loading after the runtime went away");
            }
        });
        receiver
    }
}

/// Outcome of looking up the native implementation of a method
pub enum NativeLookup {
    Found(NativeMethod),

    /// The module for the class is still loading: the thread is now waiting on it
    Pending,
    Missing,
}

struct PendingModule {
    class_name: String,
    receiver: Receiver<NativeModule>,

    /// Threads waiting on the module, in the order they started waiting
    waiters: VecDeque<ThreadHandle>,
}

/// Native method table, keyed by declaring class and name-and-descriptor
#[derive(Default)]
pub struct NativeRegistry {
    methods: RefCell<HashMap<(String, String), NativeMethod>>,
    pending: RefCell<Vec<PendingModule>>,
}

impl NativeRegistry {
    pub fn new() -> NativeRegistry {
        NativeRegistry::default()
    }

    pub fn register(&self, class_name: &str, name_and_descriptor: &str, method: NativeMethod) {
        self.methods.borrow_mut().insert(
            (class_name.to_owned(), name_and_descriptor.to_owned()),
            method,
        );
    }

    pub fn register_module(&self, module: NativeModule) {
        log::debug!(
            "Registering {} natives for {}",
            module.methods.len(),
            module.class_name
        );
        let mut methods = self.methods.borrow_mut();
        for (name_and_descriptor, method) in module.methods {
            methods.insert((module.class_name.clone(), name_and_descriptor), method);
        }
    }

    /// Register a module which is still being loaded
    ///
    /// Until the module arrives, threads that call a native method of the class wait for it.
    pub fn register_async(&self, class_name: impl Into<String>, receiver: Receiver<NativeModule>) {
        self.pending.borrow_mut().push(PendingModule {
            class_name: class_name.into(),
            receiver,
            waiters: VecDeque::new(),
        });
    }

    pub fn lookup(
        &self,
        class_name: &str,
        name_and_descriptor: &str,
        thread: &ThreadHandle,
    ) -> NativeLookup {
        let key = (class_name.to_owned(), name_and_descriptor.to_owned());
        if let Some(method) = self.methods.borrow().get(&key) {
            return NativeLookup::Found(*method);
        }

        let mut pending = self.pending.borrow_mut();
        match pending.iter_mut().find(|module| module.class_name == class_name) {
            Some(module) => {
                log::debug!(
                    "Thread {:?} waits for the natives of {}",
                    thread.name(),
                    class_name
                );
                thread.set_status(ThreadStatus::Waiting);
                module.waiters.push_back(thread.clone());
                NativeLookup::Pending
            }
            None => NativeLookup::Missing,
        }
    }

    /// Install every module that finished loading, returning the threads woken up (in order)
    pub fn poll(&self) -> Vec<ThreadHandle> {
        let mut arrived: Vec<NativeModule> = vec![];
        let mut woken: Vec<ThreadHandle> = vec![];

        self.pending.borrow_mut().retain_mut(|module| {
            match module.receiver.try_recv() {
                Ok(loaded) => arrived.push(loaded),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    log::warn!("Native module for {} failed to load", module.class_name);
                }
            }
            woken.extend(module.waiters.drain(..));
            false
        });

        for module in arrived {
            self.register_module(module);
        }
        for thread in &woken {
            thread.set_status(ThreadStatus::Runnable);
        }
        woken
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Block the host until some pending module is ready (or the timeout elapses)
    ///
    /// Returns `false` if there was nothing to wait on or the timeout elapsed.
    pub fn wait_for_any(&self, timeout: Option<Duration>) -> bool {
        let pending = self.pending.borrow();
        if pending.is_empty() {
            return false;
        }
        let mut select = Select::new();
        for module in pending.iter() {
            select.recv(&module.receiver);
        }
        match timeout {
            None => {
                select.ready();
                true
            }
            Some(timeout) => select.ready_timeout(timeout).is_ok(),
        }
    }
}
