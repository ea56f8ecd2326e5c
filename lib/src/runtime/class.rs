use super::{ClassLoader, Monitor, MonitorRef, ObjectRef, RuntimeConstantPool, ThreadHandle, ThreadId, ThreadStatus, Value};
use crate::jvm::class_file::{BootstrapMethod, ConstantIndex, ExceptionHandler};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, RenderDescriptor, UnqualifiedName, Visibility,
};
use crate::util::RefId;
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::cell::{Cell, OnceCell, Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// What sort of class this is
///
/// Array and primitive classes are synthesized by loaders instead of being parsed from bytes.
#[derive(Copy, Clone)]
pub enum ClassKind<'g> {
    /// Regular class or interface, defined from a class file
    Scalar,

    /// Array class, defined in the same loader as its component
    Array { component: &'g ClassData<'g> },

    /// Primitive "class" (eg. `int`), always defined by the bootstrap loader
    Primitive(BaseType),
}

/// Class initialization state
///
/// Classes start `Linked`. The only way out of `Initializing` is to `Initialized` or `Erroneous`,
/// and both of those are terminal.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InitState {
    Linked,

    /// Initialization is being run by this thread
    Initializing(ThreadId),
    Initialized,
    Erroneous,
}

/// Runtime class, as defined by a loader
pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    pub kind: ClassKind<'g>,
    access_flags: ClassAccessFlags,

    /// Defining loader
    pub loader: &'g ClassLoader<'g>,

    /// Superclass is only ever missing for `java/lang/Object` and primitive classes
    pub superclass: Option<&'g ClassData<'g>>,

    /// Direct superinterfaces
    pub interfaces: Vec<&'g ClassData<'g>>,

    /// Declared methods
    pub methods: FrozenVec<&'g MethodData<'g>>,

    /// Declared fields
    pub fields: FrozenVec<&'g FieldData<'g>>,

    /// Initial values of every instance field (including inherited ones) by slot
    pub(crate) instance_defaults: Vec<Value<'g>>,

    /// Static fields declared by this class, by slot
    statics: RefCell<Vec<Value<'g>>>,

    pub constant_pool: RuntimeConstantPool<'g>,
    pub bootstrap_methods: Vec<BootstrapMethod>,

    init_state: Cell<InitState>,

    /// Threads blocked until another thread finishes initializing this class
    init_waiters: RefCell<Vec<ThreadHandle>>,

    monitor: OnceCell<MonitorRef>,
    pub(crate) mirror: OnceCell<ObjectRef<'g>>,

    /// `invokedynamic` call sites already linked, by constant pool index
    pub(crate) call_sites: FrozenMap<u16, &'g MethodData<'g>>,
}

impl<'g> ClassData<'g> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: BinaryName,
        kind: ClassKind<'g>,
        access_flags: ClassAccessFlags,
        loader: &'g ClassLoader<'g>,
        superclass: Option<&'g ClassData<'g>>,
        interfaces: Vec<&'g ClassData<'g>>,
        instance_defaults: Vec<Value<'g>>,
        statics: Vec<Value<'g>>,
        constant_pool: RuntimeConstantPool<'g>,
        bootstrap_methods: Vec<BootstrapMethod>,
    ) -> ClassData<'g> {
        // Nothing to run for synthesized classes
        let init_state = match kind {
            ClassKind::Scalar => InitState::Linked,
            ClassKind::Array { .. } | ClassKind::Primitive(_) => InitState::Initialized,
        };
        ClassData {
            name,
            kind,
            access_flags,
            loader,
            superclass,
            interfaces,
            methods: FrozenVec::new(),
            fields: FrozenVec::new(),
            instance_defaults,
            statics: RefCell::new(statics),
            constant_pool,
            bootstrap_methods,
            init_state: Cell::new(init_state),
            init_waiters: RefCell::new(vec![]),
            monitor: OnceCell::new(),
            mirror: OnceCell::new(),
            call_sites: FrozenMap::new(),
        }
    }

    pub fn access_flags(&self) -> ClassAccessFlags {
        self.access_flags
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::PUBLIC)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::FINAL)
    }

    pub fn is_super(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::SUPER)
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ABSTRACT)
    }

    pub fn is_synthetic(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::SYNTHETIC)
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ANNOTATION)
    }

    pub fn is_enum(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ENUM)
    }

    pub fn is_module(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::MODULE)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassKind::Array { .. })
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ClassKind::Primitive(_))
    }

    /// Component class of an array class
    pub fn component(&self) -> Option<&'g ClassData<'g>> {
        match self.kind {
            ClassKind::Array { component } => Some(component),
            _ => None,
        }
    }

    /// Innermost component of an array class (or the class itself for non-arrays)
    pub fn element_class(&self) -> &ClassData<'g> {
        let mut class = self;
        while let ClassKind::Array { component } = class.kind {
            class = component;
        }
        class
    }

    /// Is this class in the same runtime package as `other`?
    ///
    /// Runtime packages are distinguished by both the package name and the defining loader.
    pub fn same_package(&self, other: &ClassData<'g>) -> bool {
        std::ptr::eq(self.loader, other.loader) && self.name.package() == other.name.package()
    }

    /// Can code in `package` of a class defined by `loader` refer to this class?
    pub fn is_accessible_to(&self, loader: &ClassLoader<'g>, package: &str) -> bool {
        let element = self.element_class();
        match element.kind {
            ClassKind::Primitive(_) => true,
            _ => {
                element.is_public()
                    || (std::ptr::eq(element.loader, loader) && element.name.package() == package)
            }
        }
    }

    /// Load a class by name, on behalf of this class, and check that this class may access it
    pub fn resolve_class(&'g self, name: &str) -> Result<&'g ClassData<'g>, Error> {
        let class = self.loader.load_class(name)?;
        if class.is_accessible_to(self.loader, self.name.package()) {
            Ok(class)
        } else {
            Err(Error::IllegalAccess(format!(
                "class {} cannot access class {}",
                self.name, class.name
            )))
        }
    }

    /// Check that this class may access a member declared in `declaring` with `visibility`
    pub fn check_member_access(
        &self,
        declaring: &ClassData<'g>,
        visibility: Visibility,
        member: &dyn fmt::Display,
    ) -> Result<(), Error> {
        let allowed = match visibility {
            Visibility::Public => true,
            Visibility::Private => std::ptr::eq(self, declaring),
            Visibility::Package => self.same_package(declaring),
            Visibility::Protected => self.same_package(declaring) || self.is_subclass_of(declaring),
        };
        if allowed {
            Ok(())
        } else {
            Err(Error::IllegalAccess(format!(
                "class {} cannot access {:?} member {}",
                self.name, visibility, member
            )))
        }
    }

    /// Is `ancestor` somewhere on the superclass chain of this class (or this class itself)?
    pub fn is_subclass_of(&self, ancestor: &ClassData<'g>) -> bool {
        let mut next = Some(self);
        while let Some(class) = next {
            if std::ptr::eq(class, ancestor) {
                return true;
            }
            next = class.superclass;
        }
        false
    }

    /// Does any supertype (including this class) have this name?
    ///
    /// This is a name-based check, used to classify throwables without loading anything.
    pub fn has_supertype_named(&self, name: &BinaryName) -> bool {
        let mut to_visit: Vec<&ClassData<'g>> = vec![self];
        let mut dont_revisit: HashSet<RefId<ClassData<'g>>> = HashSet::new();
        dont_revisit.insert(RefId(self));
        while let Some(class) = to_visit.pop() {
            if &class.name == name {
                return true;
            }
            for next in class.superclass.iter().chain(class.interfaces.iter()) {
                if dont_revisit.insert(RefId(*next)) {
                    to_visit.push(*next);
                }
            }
        }
        false
    }

    /// Can a value of this class be stored where `target` is expected?
    ///
    /// This is the relation used by `checkcast`, `instanceof`, `aastore`, and exception handler
    /// matching.
    pub fn is_assignable_to(&self, target: &ClassData<'g>) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        match (self.kind, target.kind) {
            (ClassKind::Array { component: sub }, ClassKind::Array { component: sup }) => {
                match (sub.kind, sup.kind) {
                    (ClassKind::Primitive(sub), ClassKind::Primitive(sup)) => sub == sup,
                    (ClassKind::Primitive(_), _) | (_, ClassKind::Primitive(_)) => false,
                    _ => sub.is_assignable_to(sup),
                }
            }

            // Special superclass and interfaces of all arrays
            (ClassKind::Array { .. }, ClassKind::Scalar) => is_array_type_assignable(&target.name),

            (ClassKind::Scalar, ClassKind::Scalar) => self.is_object_type_assignable(target),

            _ => false,
        }
    }

    /// Search up the superclasses and superinterfaces looking for the super type
    fn is_object_type_assignable(&self, super_type: &ClassData<'g>) -> bool {
        let mut supertypes_to_visit: Vec<&ClassData<'g>> = vec![self];
        let mut dont_revisit: HashSet<RefId<ClassData<'g>>> = HashSet::new();
        dont_revisit.insert(RefId(self));

        // Optimization: if the super type is a class, then skip visiting interfaces
        let super_is_class: bool = !super_type.is_interface();

        while let Some(class_data) = supertypes_to_visit.pop() {
            if std::ptr::eq(class_data, super_type) {
                return true;
            }

            // Enqueue next types to visit
            if let Some(superclass) = class_data.superclass {
                if dont_revisit.insert(RefId(superclass)) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &class_data.interfaces {
                    if dont_revisit.insert(RefId(*interface)) {
                        supertypes_to_visit.push(interface);
                    }
                }
            }
        }

        false
    }

    /// Method declared directly on this class
    pub fn find_method(&'g self, name: &str, descriptor: &str) -> Option<&'g MethodData<'g>> {
        self.methods
            .iter()
            .find(|method| method.name.as_str() == name && method.descriptor_text == descriptor)
    }

    /// Field declared directly on this class
    pub fn find_field(&'g self, name: &str, descriptor: &str) -> Option<&'g FieldData<'g>> {
        self.fields
            .iter()
            .find(|field| field.name.as_str() == name && field.descriptor_text == descriptor)
    }

    /// Resolve a `Methodref` against this class
    ///
    /// The superclass chain is searched first, then the maximally-specific superinterface methods.
    pub fn resolve_method(&'g self, name: &str, descriptor: &str) -> Result<&'g MethodData<'g>, Error> {
        if self.is_interface() {
            return Err(Error::IncompatibleClassChange(format!(
                "Found interface {}, but class was expected",
                self.name
            )));
        }

        let mut next = Some(self);
        while let Some(class) = next {
            if let Some(method) = class.find_method(name, descriptor) {
                return Ok(method);
            }
            next = class.superclass;
        }

        self.resolve_in_superinterfaces(name, descriptor)
    }

    /// Resolve an `InterfaceMethodref` against this interface
    pub fn resolve_interface_method(
        &'g self,
        name: &str,
        descriptor: &str,
    ) -> Result<&'g MethodData<'g>, Error> {
        if !self.is_interface() {
            return Err(Error::IncompatibleClassChange(format!(
                "Found class {}, but interface was expected",
                self.name
            )));
        }

        if let Some(method) = self.find_method(name, descriptor) {
            return Ok(method);
        }

        // Public instance methods of `java/lang/Object` are members of every interface
        if let Some(object) = self.superclass {
            if let Some(method) = object.find_method(name, descriptor) {
                if method.is_public() && !method.is_static() {
                    return Ok(method);
                }
            }
        }

        self.resolve_in_superinterfaces(name, descriptor)
    }

    fn resolve_in_superinterfaces(
        &'g self,
        name: &str,
        descriptor: &str,
    ) -> Result<&'g MethodData<'g>, Error> {
        let candidates: Vec<&'g MethodData<'g>> = self
            .superinterface_methods(name, descriptor)
            .into_iter()
            .filter(|method| !method.is_private() && !method.is_static())
            .collect();

        // Prefer the unique non-abstract maximally-specific method, else any candidate will do
        let concrete: Vec<&'g MethodData<'g>> = maximally_specific(&candidates)
            .into_iter()
            .filter(|method| !method.is_abstract())
            .collect();
        if let [method] = concrete[..] {
            return Ok(method);
        }
        candidates.first().copied().ok_or_else(|| {
            Error::NoSuchMethod(format!("{}.{}{}", self.name, name, descriptor))
        })
    }

    /// Methods with this name and descriptor declared in any superinterface
    fn superinterface_methods(&'g self, name: &str, descriptor: &str) -> Vec<&'g MethodData<'g>> {
        let mut found = vec![];
        for interface in self.all_superinterfaces() {
            if let Some(method) = interface.find_method(name, descriptor) {
                found.push(method);
            }
        }
        found
    }

    /// Every superinterface, direct or inherited (through interfaces or superclasses)
    pub fn all_superinterfaces(&'g self) -> Vec<&'g ClassData<'g>> {
        let mut interfaces: Vec<&'g ClassData<'g>> = vec![];
        let mut dont_revisit: HashSet<RefId<ClassData<'g>>> = HashSet::new();
        let mut to_visit: Vec<&'g ClassData<'g>> = vec![self];
        while let Some(class) = to_visit.pop() {
            for interface in class.interfaces.iter().rev() {
                if dont_revisit.insert(RefId(*interface)) {
                    interfaces.push(interface);
                    to_visit.push(interface);
                }
            }
            if let Some(superclass) = class.superclass {
                to_visit.insert(0, superclass);
            }
        }
        interfaces
    }

    /// Select the method to run for `invokevirtual` or `invokeinterface` when the receiver has
    /// this class
    pub fn select_method(&'g self, resolved: &'g MethodData<'g>) -> Result<&'g MethodData<'g>, Error> {
        if resolved.is_private() {
            return Ok(resolved);
        }

        let name = resolved.name.as_str();
        let descriptor = resolved.descriptor_text.as_str();

        let mut next = Some(self);
        while let Some(class) = next {
            if let Some(method) = class.find_method(name, descriptor) {
                if !method.is_static() && method.can_override(resolved) {
                    return if method.is_abstract() {
                        Err(Error::AbstractMethod(method.to_string()))
                    } else {
                        Ok(method)
                    };
                }
            }
            next = class.superclass;
        }

        self.select_default_method(name, descriptor)
    }

    /// Select the target of an `invokespecial` from code in this class
    ///
    /// With `ACC_SUPER`, a method resolved in a proper superclass is looked up again starting
    /// from the direct superclass so that overrides between the two are honoured.
    pub fn select_special(&'g self, resolved: &'g MethodData<'g>) -> Result<&'g MethodData<'g>, Error> {
        let start = match self.superclass {
            Some(superclass)
                if self.is_super()
                    && resolved.name != UnqualifiedName::INIT
                    && !resolved.class.is_interface()
                    && !std::ptr::eq(resolved.class, self)
                    && self.is_subclass_of(resolved.class) =>
            {
                superclass
            }
            _ => return Self::concrete(resolved),
        };

        let name = resolved.name.as_str();
        let descriptor = resolved.descriptor_text.as_str();
        let mut next = Some(start);
        while let Some(class) = next {
            if let Some(method) = class.find_method(name, descriptor) {
                if !method.is_static() {
                    return Self::concrete(method);
                }
            }
            next = class.superclass;
        }
        start.select_default_method(name, descriptor)
    }

    fn concrete(method: &'g MethodData<'g>) -> Result<&'g MethodData<'g>, Error> {
        if method.is_abstract() {
            Err(Error::AbstractMethod(method.to_string()))
        } else {
            Ok(method)
        }
    }

    /// Unique maximally-specific default method (ambiguity is an error, not a guess)
    fn select_default_method(&'g self, name: &str, descriptor: &str) -> Result<&'g MethodData<'g>, Error> {
        let candidates: Vec<&'g MethodData<'g>> = self
            .superinterface_methods(name, descriptor)
            .into_iter()
            .filter(|method| !method.is_private() && !method.is_static())
            .collect();
        let defaults: Vec<&'g MethodData<'g>> = maximally_specific(&candidates)
            .into_iter()
            .filter(|method| !method.is_abstract())
            .collect();
        match defaults[..] {
            [method] => Ok(method),
            [] => Err(Error::AbstractMethod(format!("{}.{}{}", self.name, name, descriptor))),
            _ => Err(Error::IncompatibleClassChange(format!(
                "Conflicting default methods for {}{} in {}: {:?}",
                name, descriptor, self.name, defaults
            ))),
        }
    }

    /// Resolve a `Fieldref` against this class
    ///
    /// Declared fields are searched first, then superinterfaces, then the superclass.
    pub fn resolve_field(&'g self, name: &str, descriptor: &str) -> Result<&'g FieldData<'g>, Error> {
        self.lookup_field(name, descriptor)
            .ok_or_else(|| Error::NoSuchField(format!("{}.{}:{}", self.name, name, descriptor)))
    }

    fn lookup_field(&'g self, name: &str, descriptor: &str) -> Option<&'g FieldData<'g>> {
        if let Some(field) = self.find_field(name, descriptor) {
            return Some(field);
        }
        for interface in &self.interfaces {
            if let Some(field) = interface.lookup_field(name, descriptor) {
                return Some(field);
            }
        }
        self.superclass
            .and_then(|superclass| superclass.lookup_field(name, descriptor))
    }

    pub fn init_state(&self) -> InitState {
        self.init_state.get()
    }

    pub(crate) fn set_init_state(&self, state: InitState) {
        log::debug!("Class {} is now {:?}", self.name, state);
        self.init_state.set(state);
    }

    /// Block a thread until initialization of this class completes
    pub(crate) fn add_init_waiter(&self, thread: &ThreadHandle) {
        thread.set_status(ThreadStatus::Blocked);
        self.init_waiters.borrow_mut().push(thread.clone());
    }

    pub(crate) fn finish_initialization(&self) {
        self.set_init_state(InitState::Initialized);
        self.wake_init_waiters();
    }

    pub(crate) fn fail_initialization(&self) {
        self.set_init_state(InitState::Erroneous);
        self.wake_init_waiters();
    }

    fn wake_init_waiters(&self) {
        for waiter in self.init_waiters.borrow_mut().drain(..) {
            waiter.set_status(ThreadStatus::Runnable);
        }
    }

    /// Does this interface declare any non-abstract instance method?
    pub fn declares_default_methods(&'g self) -> bool {
        self.methods
            .iter()
            .any(|method| !method.is_abstract() && !method.is_static())
    }

    pub fn get_static(&self, field: &FieldData<'g>) -> Result<Value<'g>, Error> {
        self.statics
            .borrow()
            .get(field.slot)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("No static slot for {:?}", field)))
    }

    pub fn set_static(&self, field: &FieldData<'g>, value: Value<'g>) -> Result<(), Error> {
        match self.statics.borrow_mut().get_mut(field.slot) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::Internal(format!("No static slot for {:?}", field))),
        }
    }

    pub fn statics(&self) -> Ref<'_, Vec<Value<'g>>> {
        self.statics.borrow()
    }

    /// Monitor used by static synchronized methods, created on first use
    pub fn monitor(&self) -> MonitorRef {
        self.monitor
            .get_or_init(|| Rc::new(RefCell::new(Monitor::new())))
            .clone()
    }
}

/// Check if arrays can be assigned to a super type
///
/// This bakes in knowledge of the small, finite set of super types arrays have.
fn is_array_type_assignable(super_type: &BinaryName) -> bool {
    super_type == &BinaryName::OBJECT
        || super_type == &BinaryName::CLONEABLE
        || super_type == &BinaryName::SERIALIZABLE
}

/// Drop candidates declared in a superinterface of some other candidate's interface
fn maximally_specific<'g>(candidates: &[&'g MethodData<'g>]) -> Vec<&'g MethodData<'g>> {
    candidates
        .iter()
        .filter(|method| {
            !candidates.iter().any(|other| {
                !std::ptr::eq(other.class, method.class)
                    && other.class.is_assignable_to(method.class)
            })
        })
        .copied()
        .collect()
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> fmt::Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

/// Bytecode body of a method
pub struct MethodCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub exception_table: Vec<ExceptionHandler>,
}

pub struct MethodData<'g> {
    /// Declaring class
    pub class: &'g ClassData<'g>,

    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor<BinaryName>,
    pub(crate) descriptor_text: String,
    pub access_flags: MethodAccessFlags,

    /// Missing for `native` and `abstract` methods
    pub code: Option<MethodCode>,
}

impl<'g> MethodData<'g> {
    pub(crate) fn new(
        class: &'g ClassData<'g>,
        name: UnqualifiedName,
        descriptor: MethodDescriptor<BinaryName>,
        access_flags: MethodAccessFlags,
        code: Option<MethodCode>,
    ) -> MethodData<'g> {
        MethodData {
            class,
            name,
            descriptor_text: descriptor.render(),
            descriptor,
            access_flags,
            code,
        }
    }

    pub fn descriptor_text(&self) -> &str {
        &self.descriptor_text
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_public(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PUBLIC)
    }

    pub fn is_private(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_native(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::NATIVE)
    }

    pub fn is_synchronized(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::SYNCHRONIZED)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::FINAL)
    }

    pub fn visibility(&self) -> Visibility {
        self.access_flags.visibility()
    }

    /// Number of local slots taken by the arguments (including `this`)
    pub fn argument_slots(&self) -> usize {
        self.descriptor.parameter_length(!self.is_static())
    }

    /// Can this method override `other` (assuming matching name and descriptor)?
    pub fn can_override(&self, other: &MethodData<'g>) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.is_private() || other.is_private() {
            return false;
        }
        match other.visibility() {
            Visibility::Public | Visibility::Protected => true,
            Visibility::Package => self.class.same_package(other.class),
            Visibility::Private => false,
        }
    }
}

impl<'g> fmt::Display for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class.name, self.name.as_str(), self.descriptor_text)
    }
}

impl<'g> fmt::Debug for MethodData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub struct FieldData<'g> {
    /// Declaring class
    ///
    /// Note: this is a pointer back to the class (so don't derive `Debug`)
    pub class: &'g ClassData<'g>,

    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub(crate) descriptor_text: String,
    pub access_flags: FieldAccessFlags,

    /// Index into the statics of the declaring class, or into the instance fields of objects
    pub slot: usize,

    /// `ConstantValue` attribute (only meaningful on static fields)
    pub constant_value: Option<ConstantIndex>,
}

impl<'g> FieldData<'g> {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::FINAL)
    }

    pub fn visibility(&self) -> Visibility {
        self.access_flags.visibility()
    }

    pub fn descriptor_text(&self) -> &str {
        &self.descriptor_text
    }
}

impl<'g> fmt::Display for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class.name, self.name.as_str(), self.descriptor_text)
    }
}

impl<'g> fmt::Debug for FieldData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
