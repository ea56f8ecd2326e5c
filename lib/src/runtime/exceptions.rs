use super::{
    ClassData, NativeValue, Object, ObjectRef, Runtime, RuntimeConstant, StackFrame, Thread, Value,
};
use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};
use std::rc::Rc;

/// Outcome of searching one frame's exception table
enum HandlerLookup {
    Found(usize),
    Missing,

    /// Resolving a catch type failed: the error replaces the exception in flight, and the search
    /// goes on from the next entry
    Failed { next: usize, error: Error },
}

impl<'g> Runtime<'g> {
    /// Throw an exception in a thread
    ///
    /// Frames are searched top-down for a matching handler. The first frame with one gets its
    /// operand stack replaced by the exception and continues at the handler. Frames without a
    /// handler are popped (releasing the monitors of synchronized methods). If no frame catches the
    /// exception, the thread terminates and the uncaught exception hook runs.
    ///
    /// An exception escaping a `<clinit>` marks the class as erroneous. Unless it is already an
    /// `Error`, it is wrapped in an `ExceptionInInitializerError` for the rest of the unwinding.
    pub fn throw_exception(
        &self,
        thread: &mut Thread<'g>,
        exception: ObjectRef<'g>,
    ) -> Result<(), Error> {
        log::debug!("Thread {:?} throws {:?}", thread.name(), exception);
        let mut exception = exception;
        let mut first_handler = 0;
        loop {
            let lookup = match thread.frames().last() {
                None => {
                    thread.terminate_with(exception.clone());
                    self.uncaught_handler
                        .uncaught_exception(self, thread, &exception);
                    return Ok(());
                }
                Some(frame) if frame.native.is_none() => {
                    self.find_handler(frame, &exception, first_handler)?
                }
                Some(_) => HandlerLookup::Missing,
            };

            match lookup {
                HandlerLookup::Found(handler_pc) => {
                    let frame = thread.frame_mut()?;
                    frame.operand_stack.clear();
                    frame.push(Value::Object(exception))?;
                    frame.pc = handler_pc;
                    return Ok(());
                }
                HandlerLookup::Failed { next, error } => {
                    log::debug!("Catch type failed to resolve, throwing {} instead", error);
                    exception = self.throwable_for(&error)?;
                    first_handler = next;
                    continue;
                }
                HandlerLookup::Missing => (),
            }

            first_handler = 0;
            if let Some(frame) = thread.pop_frame() {
                thread.release_frame(&frame);
                if let Some(class) = frame.initializing {
                    class.fail_initialization();
                    if !exception.class.has_supertype_named(&BinaryName::ERROR) {
                        let wrapper = self
                            .bootstrap
                            .load_class(BinaryName::EXCEPTIONININITIALIZERERROR.as_str())?;
                        exception = self.new_throwable(wrapper, None, Some(exception))?;
                    }
                }
            }
        }
    }

    /// Handler in the frame covering the current pc and catching the exception
    ///
    /// Only entries from `first_handler` onwards in the exception table are considered.
    fn find_handler(
        &self,
        frame: &StackFrame<'g>,
        exception: &ObjectRef<'g>,
        first_handler: usize,
    ) -> Result<HandlerLookup, Error> {
        let code = match &frame.method.code {
            Some(code) => code,
            None => return Ok(HandlerLookup::Missing),
        };
        let class = frame.class();
        for (position, handler) in code.exception_table.iter().enumerate().skip(first_handler) {
            if !handler.covers(frame.pc) {
                continue;
            }
            let catch_type = match handler.catch_type {
                None => return Ok(HandlerLookup::Found(handler.handler_pc as usize)),
                Some(catch_type) => catch_type,
            };
            let error = match class.constant_pool.resolve(self, class, catch_type.0) {
                Ok(RuntimeConstant::Class(catch_class)) => {
                    if exception.class.is_assignable_to(catch_class) {
                        return Ok(HandlerLookup::Found(handler.handler_pc as usize));
                    }
                    continue;
                }
                Ok(_) => Error::Format(format!(
                    "Catch type #{} in {} is not a class",
                    catch_type.0 .0, frame.method
                )),
                Err(err) if err.guest_class().is_some() => err,
                Err(err) => return Err(err),
            };
            return Ok(HandlerLookup::Failed {
                next: position + 1,
                error,
            });
        }
        Ok(HandlerLookup::Missing)
    }

    /// Guest exception for a loading or linking error
    fn throwable_for(&self, error: &Error) -> Result<ObjectRef<'g>, Error> {
        let class_name = error
            .guest_class()
            .ok_or_else(|| Error::Internal(format!("No guest exception for {}", error)))?;
        let class = self.bootstrap.load_class(class_name.as_str())?;
        self.new_throwable(class, Some(&error.message()), None)
    }

    /// Create and throw an exception of a class known to the bootstrap loader
    ///
    /// No constructor runs: the message and cause are set directly.
    pub fn throw_new(
        &self,
        thread: &mut Thread<'g>,
        class_name: &BinaryName,
        message: Option<&str>,
    ) -> Result<(), Error> {
        let class = self.bootstrap.load_class(class_name.as_str())?;
        let exception = self.new_throwable(class, message, None)?;
        self.throw_exception(thread, exception)
    }

    /// Throw the guest exception corresponding to a loading or linking error
    ///
    /// Errors with no guest counterpart (eg. corrupt interpreter state) are returned instead.
    pub fn throw_error(&self, thread: &mut Thread<'g>, error: Error) -> Result<(), Error> {
        match error.guest_class() {
            Some(class_name) => self.throw_new(thread, &class_name, Some(&error.message())),
            None => Err(error),
        }
    }

    /// Allocate a throwable without running its constructor
    pub fn new_throwable(
        &self,
        class: &'g ClassData<'g>,
        message: Option<&str>,
        cause: Option<ObjectRef<'g>>,
    ) -> Result<ObjectRef<'g>, Error> {
        let throwable = Object::new_instance(class);
        if let Some(message) = message {
            throwable.set_native("message", NativeValue::Text(Rc::from(message)));
            if let Ok(field) =
                class.resolve_field(UnqualifiedName::DETAILMESSAGE.as_str(), "Ljava/lang/String;")
            {
                if !field.is_static() {
                    throwable.set_field(field.slot, Value::Object(self.new_string(message)?))?;
                }
            }
        }
        if let Some(cause) = cause {
            if let Ok(field) =
                class.resolve_field(UnqualifiedName::CAUSE.as_str(), "Ljava/lang/Throwable;")
            {
                if !field.is_static() {
                    throwable.set_field(field.slot, Value::Object(cause))?;
                }
            }
        }
        Ok(throwable)
    }

    /// Message of a throwable, from its `detailMessage` field or from the runtime
    pub fn exception_message(&self, exception: &Object<'g>) -> Option<String> {
        if let Ok(field) = exception
            .class
            .resolve_field(UnqualifiedName::DETAILMESSAGE.as_str(), "Ljava/lang/String;")
        {
            if let Ok(Value::Object(message)) = exception.get_field(field.slot) {
                return self.string_text(&message);
            }
        }
        exception.native_text("message").map(|text| text.to_string())
    }

    /// Class name and message of a throwable (eg. `java/lang/Error: oops`)
    pub fn describe_exception(&self, exception: &Object<'g>) -> String {
        match self.exception_message(exception) {
            Some(message) => format!("{}: {}", exception.class.name, message),
            None => exception.class.name.to_string(),
        }
    }
}
