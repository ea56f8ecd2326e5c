use super::{ClassData, InitState, Runtime, RuntimeConstant, StackFrame, Thread, Value};
use crate::jvm::{BaseType, BinaryName, Error, FieldType, UnqualifiedName, Name};

/// Where class initialization stands after `ensure_initialized`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InitProgress {
    /// The class can be used right away
    Ready,

    /// A `<clinit>` frame was pushed: once it returns, try again
    Pushed,

    /// Another thread is initializing the class: this thread is now blocked until it is done
    Blocked,

    /// An exception was thrown into the thread
    Thrown,
}

/// Make progress on initializing a class
///
/// This never runs bytecode itself: it pushes `<clinit>` frames and lets the caller run them. The
/// instruction which triggered initialization is expected to run again (and call this again)
/// until the result is `Ready`. Superclasses (and superinterfaces declaring default methods) are
/// always initialized first.
pub fn ensure_initialized<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    class: &'g ClassData<'g>,
) -> Result<InitProgress, Error> {
    match class.init_state() {
        InitState::Initialized => return Ok(InitProgress::Ready),
        InitState::Initializing(owner) if owner == thread.id() => return Ok(InitProgress::Ready),
        InitState::Initializing(_) => {
            class.add_init_waiter(thread.handle());
            return Ok(InitProgress::Blocked);
        }
        InitState::Erroneous => {
            let message = format!("Could not initialize class {}", class.name);
            runtime.throw_new(thread, &BinaryName::NOCLASSDEFFOUNDERROR, Some(&message))?;
            return Ok(InitProgress::Thrown);
        }
        InitState::Linked => (),
    }

    if !class.is_interface() {
        let supertypes = class.superclass.into_iter().chain(
            class
                .all_superinterfaces()
                .into_iter()
                .filter(|interface| interface.declares_default_methods()),
        );
        for supertype in supertypes {
            match ensure_initialized(runtime, thread, supertype)? {
                InitProgress::Ready => (),
                other => return Ok(other),
            }
        }
    }

    let clinit = class
        .find_method(UnqualifiedName::CLINIT.as_str(), "()V")
        .filter(|clinit| clinit.is_static() && clinit.code.is_some());

    // The class stays linked, so a shallower stack can still initialize it
    if clinit.is_some() && thread.depth() >= runtime.settings.max_call_depth {
        runtime.throw_new(thread, &BinaryName::STACKOVERFLOWERROR, None)?;
        return Ok(InitProgress::Thrown);
    }

    class.set_init_state(InitState::Initializing(thread.id()));
    if let Err(err) = apply_constant_values(runtime, class) {
        class.fail_initialization();
        runtime.throw_error(thread, err)?;
        return Ok(InitProgress::Thrown);
    }

    match clinit {
        Some(clinit) => {
            log::debug!("Running {} on thread {:?}", clinit, thread.name());
            let mut frame = StackFrame::new(clinit, vec![]);
            frame.initializing = Some(class);
            thread.push_frame(frame)?;
            Ok(InitProgress::Pushed)
        }
        None => {
            class.finish_initialization();
            Ok(InitProgress::Ready)
        }
    }
}

/// Set static fields which have a `ConstantValue` attribute
fn apply_constant_values<'g>(runtime: &Runtime<'g>, class: &'g ClassData<'g>) -> Result<(), Error> {
    for field in class.fields.iter() {
        let index = match field.constant_value {
            Some(index) if field.is_static() => index,
            _ => continue,
        };
        let value = match (&field.descriptor, class.constant_pool.resolve(runtime, class, index)?) {
            (FieldType::Base(BaseType::Long), RuntimeConstant::Long(long)) => Value::Long(long),
            (FieldType::Base(BaseType::Float), RuntimeConstant::Float(float)) => Value::Float(float),
            (FieldType::Base(BaseType::Double), RuntimeConstant::Double(double)) => {
                Value::Double(double)
            }
            (
                FieldType::Base(
                    BaseType::Int | BaseType::Short | BaseType::Char | BaseType::Byte | BaseType::Boolean,
                ),
                RuntimeConstant::Integer(int),
            ) => Value::Int(int),
            (FieldType::Ref(_), RuntimeConstant::String(string)) => Value::Object(string),
            _ => {
                return Err(Error::Format(format!(
                    "Constant value #{} doesn't match the type of {}",
                    index.0, field
                )))
            }
        };
        class.set_static(field, value)?;
    }
    Ok(())
}
