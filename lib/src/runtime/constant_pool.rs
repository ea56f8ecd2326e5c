use super::{ClassData, FieldData, MethodData, ObjectRef, Runtime};
use crate::jvm::class_file::{
    ClassConstantIndex, Constant, ConstantIndex, HandleKind, NameAndTypeConstantIndex,
    Utf8ConstantIndex,
};
use crate::jvm::Error;
use crate::util::{Offset, OffsetResult, OffsetVec};
use std::cell::RefCell;
use std::rc::Rc;

/// Constant pool of a loaded class, resolved lazily
///
/// Each entry is resolved at most once: successful resolutions are memoized, failures are not
/// (so a class which is missing now can still be found later). Dependencies are resolved with
/// an explicit stack, so deep chains of references can't overflow the host stack, and an entry
/// which depends on itself (directly or transitively) is rejected as a format error.
pub struct RuntimeConstantPool<'g> {
    constants: OffsetVec<Constant>,
    slots: RefCell<Vec<Slot<'g>>>,
}

#[derive(Clone)]
enum Slot<'g> {
    Unresolved,

    /// Dependencies of this entry are being resolved
    Resolving,
    Resolved(RuntimeConstant<'g>),
}

/// Resolved constant
#[derive(Clone)]
pub enum RuntimeConstant<'g> {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Utf8(Rc<str>),

    /// Interned `java/lang/String` instance
    String(ObjectRef<'g>),
    Class(&'g ClassData<'g>),
    NameAndType {
        name: Rc<str>,
        descriptor: Rc<str>,
    },
    Field(&'g FieldData<'g>),
    Method(&'g MethodData<'g>),
    InterfaceMethod(&'g MethodData<'g>),

    /// Member is left as an index (it is itself resolved by the time this is)
    MethodHandle {
        kind: HandleKind,
        member: ConstantIndex,
    },
    MethodType(Rc<str>),
    Dynamic {
        bootstrap_method: u16,
        name: Rc<str>,
        descriptor: Rc<str>,
    },
    InvokeDynamic {
        bootstrap_method: u16,
        name: Rc<str>,
        descriptor: Rc<str>,
    },
    Module(Rc<str>),
    Package(Rc<str>),
}

impl<'g> RuntimeConstantPool<'g> {
    pub fn new(constants: OffsetVec<Constant>) -> RuntimeConstantPool<'g> {
        let slots = vec![Slot::Unresolved; constants.offset_len().0];
        RuntimeConstantPool {
            constants,
            slots: RefCell::new(slots),
        }
    }

    pub fn empty() -> RuntimeConstantPool<'g> {
        RuntimeConstantPool::new(OffsetVec::new_starting_at(Offset(1)))
    }

    /// Raw constant at an index, after validating the index
    pub fn raw(&self, index: ConstantIndex) -> Result<&Constant, Error> {
        match self.constants.get_offset(Offset(index.0 as usize)) {
            OffsetResult::Ok(_, constant) => Ok(constant),
            OffsetResult::InvalidOffset(_) | OffsetResult::TooLarge => Err(Error::Format(
                format!("Invalid constant pool index #{}", index.0),
            )),
        }
    }

    /// Raw text of a `Utf8` entry
    pub fn utf8(&self, index: Utf8ConstantIndex) -> Result<&str, Error> {
        match self.raw(index.0)? {
            Constant::Utf8(text) => Ok(text),
            other => Err(unexpected("Utf8", index.0, other)),
        }
    }

    /// Raw name in a `Class` entry
    pub fn class_name(&self, index: ClassConstantIndex) -> Result<&str, Error> {
        match self.raw(index.0)? {
            Constant::Class(name) => self.utf8(*name),
            other => Err(unexpected("Class", index.0, other)),
        }
    }

    /// Raw name and descriptor in a `NameAndType` entry
    pub fn name_and_type(&self, index: NameAndTypeConstantIndex) -> Result<(&str, &str), Error> {
        match self.raw(index.0)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            other => Err(unexpected("NameAndType", index.0, other)),
        }
    }

    /// Owner class, name, and descriptor of a method referenced from a `MethodHandle` entry
    ///
    /// This reads the raw pool only, so nothing is loaded.
    pub fn method_handle_target(&self, index: ConstantIndex) -> Result<(&str, &str, &str), Error> {
        match self.raw(index)? {
            Constant::MethodHandle { member, .. } => match self.raw(*member)? {
                Constant::MethodRef {
                    class,
                    name_and_type,
                    ..
                }
                | Constant::FieldRef(class, name_and_type) => {
                    let (name, descriptor) = self.name_and_type(*name_and_type)?;
                    Ok((self.class_name(*class)?, name, descriptor))
                }
                other => Err(unexpected("member reference", *member, other)),
            },
            other => Err(unexpected("MethodHandle", index, other)),
        }
    }

    /// Resolve the entry at `index`, on behalf of `class` (which owns this pool)
    pub fn resolve(
        &self,
        runtime: &Runtime<'g>,
        class: &'g ClassData<'g>,
        index: ConstantIndex,
    ) -> Result<RuntimeConstant<'g>, Error> {
        self.raw(index)?;
        if let Slot::Resolved(constant) = self.slot(index) {
            return Ok(constant);
        }

        let mut stack: Vec<ConstantIndex> = vec![index];
        if let Err(err) = self.resolve_stack(runtime, class, &mut stack) {
            for slot in self.slots.borrow_mut().iter_mut() {
                if let Slot::Resolving = slot {
                    *slot = Slot::Unresolved;
                }
            }
            return Err(err);
        }

        match self.slot(index) {
            Slot::Resolved(constant) => Ok(constant),
            _ => Err(Error::Internal(format!(
                "Constant #{} was not resolved",
                index.0
            ))),
        }
    }

    /// Is the entry already resolved?
    pub fn is_resolved(&self, index: ConstantIndex) -> bool {
        matches!(self.slot(index), Slot::Resolved(_))
    }

    fn slot(&self, index: ConstantIndex) -> Slot<'g> {
        self.slots
            .borrow()
            .get(index.0 as usize)
            .cloned()
            .unwrap_or(Slot::Unresolved)
    }

    fn set_slot(&self, index: ConstantIndex, slot: Slot<'g>) {
        if let Some(entry) = self.slots.borrow_mut().get_mut(index.0 as usize) {
            *entry = slot;
        }
    }

    /// Resolve everything on the stack
    ///
    /// Invariant: every `Resolving` entry is below the top of the stack and all entries above it
    /// are its (transitive) dependencies. So finding a `Resolving` dependency means a cycle.
    fn resolve_stack(
        &self,
        runtime: &Runtime<'g>,
        class: &'g ClassData<'g>,
        stack: &mut Vec<ConstantIndex>,
    ) -> Result<(), Error> {
        while let Some(&index) = stack.last() {
            if let Slot::Resolved(_) = self.slot(index) {
                stack.pop();
                continue;
            }
            self.set_slot(index, Slot::Resolving);

            let mut waiting_on_dependency = false;
            for dependency in self.dependencies(index)? {
                match self.slot(dependency) {
                    Slot::Resolved(_) => (),
                    Slot::Resolving => {
                        return Err(Error::Format(format!(
                            "Constant #{} depends on itself (through #{})",
                            index.0, dependency.0
                        )))
                    }
                    Slot::Unresolved => {
                        self.raw(dependency)?;
                        stack.push(dependency);
                        waiting_on_dependency = true;
                    }
                }
            }
            if waiting_on_dependency {
                continue;
            }

            let constant = self.construct(runtime, class, index)?;
            log::trace!("Resolved constant #{} in {}", index.0, class.name);
            self.set_slot(index, Slot::Resolved(constant));
            stack.pop();
        }
        Ok(())
    }

    /// Entries which must be resolved before this one
    fn dependencies(&self, index: ConstantIndex) -> Result<Vec<ConstantIndex>, Error> {
        Ok(match self.raw(index)? {
            Constant::Utf8(_)
            | Constant::Integer(_)
            | Constant::Float(_)
            | Constant::Long(_)
            | Constant::Double(_) => vec![],
            Constant::Class(name)
            | Constant::String(name)
            | Constant::Module(name)
            | Constant::Package(name)
            | Constant::MethodType { descriptor: name } => vec![name.0],
            Constant::NameAndType { name, descriptor } => vec![name.0, descriptor.0],
            Constant::FieldRef(class, name_and_type)
            | Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => vec![class.0, name_and_type.0],
            Constant::MethodHandle { member, .. } => vec![*member],
            Constant::Dynamic { name_and_type, .. } => vec![name_and_type.0],
            Constant::InvokeDynamic {
                method_descriptor, ..
            } => vec![method_descriptor.0],
        })
    }

    /// Build the resolved form of an entry whose dependencies are all resolved
    fn construct(
        &self,
        runtime: &Runtime<'g>,
        class: &'g ClassData<'g>,
        index: ConstantIndex,
    ) -> Result<RuntimeConstant<'g>, Error> {
        Ok(match self.raw(index)? {
            Constant::Utf8(text) => RuntimeConstant::Utf8(Rc::from(text.as_str())),
            Constant::Integer(integer) => RuntimeConstant::Integer(*integer),
            Constant::Float(float) => RuntimeConstant::Float(*float),
            Constant::Long(long) => RuntimeConstant::Long(*long),
            Constant::Double(double) => RuntimeConstant::Double(*double),
            Constant::Class(name) => {
                let name = self.resolved_utf8(name.0)?;
                RuntimeConstant::Class(class.resolve_class(&name)?)
            }
            Constant::String(text) => {
                let text = self.resolved_utf8(text.0)?;
                RuntimeConstant::String(runtime.intern(&text)?)
            }
            Constant::NameAndType { name, descriptor } => RuntimeConstant::NameAndType {
                name: self.resolved_utf8(name.0)?,
                descriptor: self.resolved_utf8(descriptor.0)?,
            },
            Constant::FieldRef(owner, name_and_type) => {
                let owner = self.resolved_class(owner.0)?;
                let (name, descriptor) = self.resolved_name_and_type(name_and_type.0)?;
                let field = owner.resolve_field(&name, &descriptor)?;
                class.check_member_access(field.class, field.visibility(), field)?;
                RuntimeConstant::Field(field)
            }
            Constant::MethodRef {
                class: owner,
                name_and_type,
                is_interface,
            } => {
                let owner = self.resolved_class(owner.0)?;
                let (name, descriptor) = self.resolved_name_and_type(name_and_type.0)?;
                if *is_interface {
                    let method = owner.resolve_interface_method(&name, &descriptor)?;
                    class.check_member_access(method.class, method.visibility(), method)?;
                    RuntimeConstant::InterfaceMethod(method)
                } else {
                    let method = owner.resolve_method(&name, &descriptor)?;
                    class.check_member_access(method.class, method.visibility(), method)?;
                    RuntimeConstant::Method(method)
                }
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => RuntimeConstant::MethodHandle {
                kind: *handle_kind,
                member: *member,
            },
            Constant::MethodType { descriptor } => {
                RuntimeConstant::MethodType(self.resolved_utf8(descriptor.0)?)
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                let (name, descriptor) = self.resolved_name_and_type(name_and_type.0)?;
                RuntimeConstant::Dynamic {
                    bootstrap_method: *bootstrap_method,
                    name,
                    descriptor,
                }
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                let (name, descriptor) = self.resolved_name_and_type(method_descriptor.0)?;
                RuntimeConstant::InvokeDynamic {
                    bootstrap_method: *bootstrap_method,
                    name,
                    descriptor,
                }
            }
            Constant::Module(name) => RuntimeConstant::Module(self.resolved_utf8(name.0)?),
            Constant::Package(name) => RuntimeConstant::Package(self.resolved_utf8(name.0)?),
        })
    }

    fn resolved_utf8(&self, index: ConstantIndex) -> Result<Rc<str>, Error> {
        match self.slot(index) {
            Slot::Resolved(RuntimeConstant::Utf8(text)) => Ok(text),
            _ => Err(unexpected("Utf8", index, self.raw(index)?)),
        }
    }

    fn resolved_class(&self, index: ConstantIndex) -> Result<&'g ClassData<'g>, Error> {
        match self.slot(index) {
            Slot::Resolved(RuntimeConstant::Class(class)) => Ok(class),
            _ => Err(unexpected("Class", index, self.raw(index)?)),
        }
    }

    fn resolved_name_and_type(&self, index: ConstantIndex) -> Result<(Rc<str>, Rc<str>), Error> {
        match self.slot(index) {
            Slot::Resolved(RuntimeConstant::NameAndType { name, descriptor }) => {
                Ok((name, descriptor))
            }
            _ => Err(unexpected("NameAndType", index, self.raw(index)?)),
        }
    }
}

fn unexpected(expected: &str, index: ConstantIndex, found: &Constant) -> Error {
    Error::Format(format!(
        "Expected {} at #{}, found {:?}",
        expected, index.0, found
    ))
}
