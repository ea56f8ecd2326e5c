use super::{ClassData, ClassKind, FieldData, MethodCode, MethodData, RuntimeConstantPool, Value};
use crate::jvm::class_file::{BootstrapMethods, ClassFile, Code, ConstantValue};
use crate::jvm::{
    BaseType, BinaryName, ClassAccessFlags, Error, FieldType, MethodDescriptor, Name,
    ParseDescriptor, RefType, UnqualifiedName,
};
use elsa::map::FrozenMap;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use typed_arena::Arena;

/// Where a loader gets class bytes from (a directory, a bundle, memory, ...)
pub trait ClassSource {
    /// Read the bytes of a class, failing with `NotFound` if the source doesn't have it
    ///
    /// Names are binary names (eg. `java/lang/Object`).
    fn read_class_bytes(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// Class source backed by an in-memory map
#[derive(Default)]
pub struct MemorySource {
    classes: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> MemorySource {
        MemorySource::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(name.into(), bytes);
    }

    pub fn with(mut self, name: impl Into<String>, bytes: Vec<u8>) -> MemorySource {
        self.insert(name, bytes);
        self
    }
}

impl ClassSource for MemorySource {
    fn read_class_bytes(&self, name: &str) -> io::Result<Vec<u8>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_owned()))
    }
}

/// Class source reading `.class` files out of directories, searched in order
#[derive(Debug)]
pub struct DirectorySource {
    roots: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(roots: impl IntoIterator<Item = P>) -> DirectorySource {
        DirectorySource {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }
}

impl ClassSource for DirectorySource {
    fn read_class_bytes(&self, name: &str) -> io::Result<Vec<u8>> {
        for root in &self.roots {
            let path = root.join(format!("{}.class", name));
            match fs::read(&path) {
                Ok(bytes) => {
                    log::trace!("Read {} from {}", name, path.display());
                    return Ok(bytes);
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(io::ErrorKind::NotFound, name.to_owned()))
    }
}

/// Backing storage for everything loaders define
///
/// Classes, members, and loaders are never freed individually: they all live as long as the
/// arenas do.
pub struct ClassArenas<'g> {
    classes: Arena<ClassData<'g>>,
    methods: Arena<MethodData<'g>>,
    fields: Arena<FieldData<'g>>,
    loaders: Arena<ClassLoader<'g>>,
}

impl<'g> ClassArenas<'g> {
    pub fn new() -> Self {
        ClassArenas {
            classes: Arena::new(),
            methods: Arena::new(),
            fields: Arena::new(),
            loaders: Arena::new(),
        }
    }

    /// Allocate a new loader
    pub fn add_loader(
        &'g self,
        name: impl Into<String>,
        parent: Option<&'g ClassLoader<'g>>,
        source: Box<dyn ClassSource>,
    ) -> &'g ClassLoader<'g> {
        let loader = ClassLoader {
            name: name.into(),
            arenas: self,
            parent,
            source,
            classes: FrozenMap::new(),
            primitives: FrozenMap::new(),
            defining: RefCell::new(HashSet::new()),
        };
        &*self.loaders.alloc(loader)
    }
}

impl<'g> Default for ClassArenas<'g> {
    fn default() -> Self {
        ClassArenas::new()
    }
}

/// Parent-delegating class loader
pub struct ClassLoader<'g> {
    name: String,
    arenas: &'g ClassArenas<'g>,
    parent: Option<&'g ClassLoader<'g>>,
    source: Box<dyn ClassSource>,

    /// Classes defined by this loader (append-only, at most one per name)
    classes: FrozenMap<String, &'g ClassData<'g>>,

    /// Primitive classes (only ever populated on the bootstrap loader)
    primitives: FrozenMap<BaseType, &'g ClassData<'g>>,

    /// Classes whose supertypes are being loaded right now
    defining: RefCell<HashSet<String>>,
}

impl<'g> ClassLoader<'g> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&'g ClassLoader<'g>> {
        self.parent
    }

    /// Loader at the top of the delegation chain
    pub fn bootstrap(&'g self) -> &'g ClassLoader<'g> {
        let mut loader = self;
        while let Some(parent) = loader.parent {
            loader = parent;
        }
        loader
    }

    /// Class already defined by this loader
    pub fn find_loaded(&'g self, name: &str) -> Option<&'g ClassData<'g>> {
        self.classes.get(name)
    }

    /// Find or load a class
    ///
    /// Array classes are synthesized from their component. Otherwise, the parent gets the first
    /// chance at the class and only if it can't find it does this loader read the bytes itself.
    pub fn load_class(&'g self, name: &str) -> Result<&'g ClassData<'g>, Error> {
        if let Some(class) = self.classes.get(name) {
            return Ok(class);
        }
        if name.starts_with('[') {
            return self.load_array_class(name);
        }

        if let Some(parent) = self.parent {
            match parent.load_class(name) {
                Err(Error::ClassNotFound(_)) => (),
                found => return found,
            }
        }

        BinaryName::check_valid(name).map_err(Error::ClassNotFound)?;
        let bytes = match self.source.read_class_bytes(name) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ClassNotFound(name.to_owned()))
            }
            Err(err) => return Err(Error::IoError(err)),
        };
        log::trace!("Read {} bytes for {} in loader {:?}", bytes.len(), name, self.name);

        let class_file = ClassFile::parse(&bytes)?;
        let actual_name = class_file.class_name(class_file.this_class)?;
        if actual_name != name {
            return Err(Error::ClassNotFound(format!(
                "{} (wrong name: {})",
                name, actual_name
            )));
        }
        self.define_class(&class_file)
    }

    /// Parse and define a class from raw bytes
    pub fn define_class_bytes(&'g self, bytes: &[u8]) -> Result<&'g ClassData<'g>, Error> {
        self.define_class(&ClassFile::parse(bytes)?)
    }

    /// Link a parsed class and register it in this loader
    ///
    /// The superclass and interfaces are loaded (recursively) through this loader. A class can
    /// only be defined once per loader.
    pub fn define_class(&'g self, class_file: &ClassFile) -> Result<&'g ClassData<'g>, Error> {
        let name = class_file.class_name(class_file.this_class)?.to_owned();
        if self.classes.get(name.as_str()).is_some() {
            return Err(Error::Linkage(format!(
                "Loader {:?} attempted duplicate class definition for {}",
                self.name, name
            )));
        }
        if !self.defining.borrow_mut().insert(name.clone()) {
            return Err(Error::ClassCircularity(name));
        }
        let result = self.link_class(class_file, &name);
        self.defining.borrow_mut().remove(&name);
        result
    }

    fn link_class(&'g self, class_file: &ClassFile, name: &str) -> Result<&'g ClassData<'g>, Error> {
        let binary_name = BinaryName::from_string(name.to_owned()).map_err(Error::Format)?;
        let package = binary_name.package().to_owned();

        let superclass: Option<&'g ClassData<'g>> = match class_file.super_class {
            None if binary_name == BinaryName::OBJECT => None,
            None => {
                return Err(Error::Format(format!("Class {} has no superclass", name)));
            }
            Some(index) => {
                let superclass = self.load_class(class_file.class_name(index)?)?;
                if superclass.is_interface() {
                    return Err(Error::IncompatibleClassChange(format!(
                        "class {} has interface {} as super class",
                        name, superclass.name
                    )));
                }
                if superclass.is_final() {
                    return Err(Error::Linkage(format!(
                        "class {} cannot inherit from final class {}",
                        name, superclass.name
                    )));
                }
                self.check_supertype_access(name, &package, superclass)?;
                Some(superclass)
            }
        };

        let mut interfaces = Vec::with_capacity(class_file.interfaces.len());
        for index in &class_file.interfaces {
            let interface = self.load_class(class_file.class_name(*index)?)?;
            if !interface.is_interface() {
                return Err(Error::IncompatibleClassChange(format!(
                    "class {} cannot implement class {} as an interface",
                    name, interface.name
                )));
            }
            self.check_supertype_access(name, &package, interface)?;
            interfaces.push(interface);
        }

        // Field layouts: instance fields follow those of the superclass
        let mut instance_defaults: Vec<Value<'g>> = superclass
            .map(|superclass| superclass.instance_defaults.clone())
            .unwrap_or_default();
        let mut statics: Vec<Value<'g>> = vec![];
        let mut fields = Vec::with_capacity(class_file.fields.len());
        for field in &class_file.fields {
            let field_name = UnqualifiedName::from_string(class_file.utf8(field.name_index)?.to_owned())
                .map_err(Error::Format)?;
            let descriptor_text = class_file.utf8(field.descriptor_index)?.to_owned();
            let descriptor = FieldType::<BinaryName>::parse(&descriptor_text)?;
            let is_static = field.access_flags.contains(crate::jvm::FieldAccessFlags::STATIC);
            let constant_value = if is_static {
                class_file
                    .decode_attribute::<ConstantValue>(&field.attributes)?
                    .map(|ConstantValue(index)| index)
            } else {
                None
            };
            let slot = if is_static {
                statics.push(Value::default_for(&descriptor));
                statics.len() - 1
            } else {
                instance_defaults.push(Value::default_for(&descriptor));
                instance_defaults.len() - 1
            };
            fields.push((field_name, descriptor, descriptor_text, field.access_flags, slot, constant_value));
        }

        let mut methods = Vec::with_capacity(class_file.methods.len());
        for method in &class_file.methods {
            let method_name = UnqualifiedName::from_string(class_file.utf8(method.name_index)?.to_owned())
                .map_err(Error::Format)?;
            let descriptor = MethodDescriptor::<BinaryName>::parse(class_file.utf8(method.descriptor_index)?)?;
            let code = class_file
                .decode_attribute::<Code>(&method.attributes)?
                .map(|code| MethodCode {
                    max_stack: code.max_stack,
                    max_locals: code.max_locals,
                    bytecode: code.code_array,
                    exception_table: code.exception_table,
                });
            let has_body = !method
                .access_flags
                .intersects(crate::jvm::MethodAccessFlags::NATIVE | crate::jvm::MethodAccessFlags::ABSTRACT);
            if has_body && code.is_none() {
                return Err(Error::Format(format!(
                    "Method {}.{} has no Code attribute",
                    name,
                    method_name.as_str()
                )));
            }
            methods.push((method_name, descriptor, method.access_flags, code));
        }

        let bootstrap_methods = class_file
            .decode_attribute::<BootstrapMethods>(&class_file.attributes)?
            .map(|BootstrapMethods(methods)| methods)
            .unwrap_or_default();

        let class = self.add_class(ClassData::new(
            binary_name,
            ClassKind::Scalar,
            class_file.access_flags,
            self,
            superclass,
            interfaces,
            instance_defaults,
            statics,
            RuntimeConstantPool::new(class_file.constants.clone()),
            bootstrap_methods,
        ));

        for (name, descriptor, descriptor_text, access_flags, slot, constant_value) in fields {
            let field = &*self.arenas.fields.alloc(FieldData {
                class,
                name,
                descriptor,
                descriptor_text,
                access_flags,
                slot,
                constant_value,
            });
            class.fields.push(field);
        }
        for (name, descriptor, access_flags, code) in methods {
            let method = &*self
                .arenas
                .methods
                .alloc(MethodData::new(class, name, descriptor, access_flags, code));
            class.methods.push(method);
        }

        log::debug!(
            "Defined class {} in loader {:?} ({} methods, {} fields)",
            class.name,
            self.name,
            class.methods.len(),
            class.fields.len()
        );
        Ok(class)
    }

    /// Superclasses and superinterfaces must be public or in the same runtime package
    fn check_supertype_access(
        &self,
        name: &str,
        package: &str,
        supertype: &ClassData<'g>,
    ) -> Result<(), Error> {
        if supertype.is_accessible_to(self, package) {
            Ok(())
        } else {
            Err(Error::IllegalAccess(format!(
                "class {} cannot access its supertype {}",
                name, supertype.name
            )))
        }
    }

    fn add_class(&'g self, class: ClassData<'g>) -> &'g ClassData<'g> {
        let class = &*self.arenas.classes.alloc(class);
        self.classes.insert(class.name.as_str().to_owned(), class)
    }

    /// Array classes are defined in the loader of their component (or the bootstrap loader for
    /// primitive components)
    fn load_array_class(&'g self, name: &str) -> Result<&'g ClassData<'g>, Error> {
        let component_name = &name[1..];
        let component: &'g ClassData<'g> = match FieldType::<BinaryName>::parse(component_name)
            .map_err(|err| Error::ClassNotFound(format!("{} ({})", name, err.message())))?
        {
            FieldType::Base(base_type) => self.bootstrap().primitive(base_type),
            FieldType::Ref(RefType::Object(element)) => self.load_class(element.as_str())?,
            FieldType::Ref(_) => self.load_class(component_name)?,
        };
        component.loader.define_array_class(name, component)
    }

    fn define_array_class(
        &'g self,
        name: &str,
        component: &'g ClassData<'g>,
    ) -> Result<&'g ClassData<'g>, Error> {
        if let Some(class) = self.classes.get(name) {
            return Ok(class);
        }

        let object = self.load_class(BinaryName::OBJECT.as_str())?;
        let mut access_flags = ClassAccessFlags::FINAL | ClassAccessFlags::ABSTRACT;
        if component.is_primitive() || component.is_public() {
            access_flags |= ClassAccessFlags::PUBLIC;
        }
        let binary_name = BinaryName::from_string(name.to_owned()).map_err(Error::Format)?;

        let class = self.add_class(ClassData::new(
            binary_name,
            ClassKind::Array { component },
            access_flags,
            self,
            Some(object),
            vec![],
            vec![],
            vec![],
            RuntimeConstantPool::empty(),
            vec![],
        ));
        log::debug!("Defined array class {} in loader {:?}", name, self.name);
        Ok(class)
    }

    /// Primitive class for a base type (only meaningful on the bootstrap loader)
    pub fn primitive(&'g self, base_type: BaseType) -> &'g ClassData<'g> {
        if let Some(class) = self.primitives.get(&base_type) {
            return class;
        }
        let name = BinaryName::from_string(base_type.java_name().to_owned())
            .unwrap_or_else(|_| BinaryName::OBJECT);
        let class = &*self.arenas.classes.alloc(ClassData::new(
            name,
            ClassKind::Primitive(base_type),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL | ClassAccessFlags::ABSTRACT,
            self,
            None,
            vec![],
            vec![],
            vec![],
            RuntimeConstantPool::empty(),
            vec![],
        ));
        self.primitives.insert(base_type, class)
    }
}

impl<'g> std::fmt::Debug for ClassLoader<'g> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassLoader({:?})", self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::ClassBuilder;

    fn class_bytes(name: &str, superclass: Option<&str>, flags: ClassAccessFlags) -> Vec<u8> {
        ClassBuilder::new(name, superclass, flags)
            .unwrap()
            .into_bytes()
            .unwrap()
    }

    fn object_source() -> MemorySource {
        MemorySource::new().with(
            "java/lang/Object",
            class_bytes("java/lang/Object", None, ClassAccessFlags::PUBLIC),
        )
    }

    #[test]
    fn delegates_to_parent_first() -> Result<(), Error> {
        let arenas = ClassArenas::new();
        let boot = arenas.add_loader("boot", None, Box::new(object_source()));
        let app_source = object_source().with(
            "Foo",
            class_bytes("Foo", Some("java/lang/Object"), ClassAccessFlags::PUBLIC),
        );
        let app = arenas.add_loader("app", Some(boot), Box::new(app_source));

        let object = app.load_class("java/lang/Object")?;
        assert!(std::ptr::eq(object.loader, boot));

        let foo = app.load_class("Foo")?;
        assert!(std::ptr::eq(foo.loader, app));
        assert!(std::ptr::eq(foo.superclass.unwrap(), object));
        assert!(std::ptr::eq(app.load_class("Foo")?, foo));

        assert!(matches!(boot.load_class("Foo"), Err(Error::ClassNotFound(_))));
        Ok(())
    }

    #[test]
    fn wrong_name_is_not_found() {
        let arenas = ClassArenas::new();
        let source = object_source().with(
            "Bar",
            class_bytes("Baz", Some("java/lang/Object"), ClassAccessFlags::PUBLIC),
        );
        let loader = arenas.add_loader("boot", None, Box::new(source));
        assert!(matches!(loader.load_class("Bar"), Err(Error::ClassNotFound(_))));
    }

    #[test]
    fn duplicate_definition_is_a_linkage_error() -> Result<(), Error> {
        let arenas = ClassArenas::new();
        let loader = arenas.add_loader("boot", None, Box::new(object_source()));
        let bytes = class_bytes("Dup", Some("java/lang/Object"), ClassAccessFlags::PUBLIC);
        loader.define_class_bytes(&bytes)?;
        assert!(matches!(loader.define_class_bytes(&bytes), Err(Error::Linkage(_))));
        Ok(())
    }

    #[test]
    fn circular_superclass() {
        let arenas = ClassArenas::new();
        let source = object_source()
            .with("A", class_bytes("A", Some("B"), ClassAccessFlags::PUBLIC))
            .with("B", class_bytes("B", Some("A"), ClassAccessFlags::PUBLIC));
        let loader = arenas.add_loader("boot", None, Box::new(source));
        assert!(matches!(loader.load_class("A"), Err(Error::ClassCircularity(_))));
        assert!(loader.find_loaded("A").is_none());
    }

    #[test]
    fn final_and_interface_superclasses_are_rejected() {
        let arenas = ClassArenas::new();
        let source = object_source()
            .with(
                "Sealed",
                class_bytes("Sealed", Some("java/lang/Object"), ClassAccessFlags::PUBLIC | ClassAccessFlags::FINAL),
            )
            .with("Child", class_bytes("Child", Some("Sealed"), ClassAccessFlags::PUBLIC))
            .with(
                "Iface",
                class_bytes(
                    "Iface",
                    Some("java/lang/Object"),
                    ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
                ),
            )
            .with("Impl", class_bytes("Impl", Some("Iface"), ClassAccessFlags::PUBLIC));
        let loader = arenas.add_loader("boot", None, Box::new(source));
        assert!(matches!(loader.load_class("Child"), Err(Error::Linkage(_))));
        assert!(matches!(loader.load_class("Impl"), Err(Error::IncompatibleClassChange(_))));
    }

    #[test]
    fn array_classes_follow_their_component() -> Result<(), Error> {
        let arenas = ClassArenas::new();
        let boot = arenas.add_loader("boot", None, Box::new(object_source()));
        let app_source = MemorySource::new().with(
            "pkg/Hidden",
            class_bytes("pkg/Hidden", Some("java/lang/Object"), ClassAccessFlags::empty()),
        );
        let app = arenas.add_loader("app", Some(boot), Box::new(app_source));

        let ints = app.load_class("[[I")?;
        assert!(std::ptr::eq(ints.loader, boot));
        assert!(ints.is_public() && ints.is_final() && ints.is_abstract());
        let inner = ints.component().unwrap();
        assert_eq!(inner.name.as_str(), "[I");
        assert!(matches!(inner.component().unwrap().kind, ClassKind::Primitive(BaseType::Int)));

        let hidden = app.load_class("[Lpkg/Hidden;")?;
        assert!(std::ptr::eq(hidden.loader, app));
        assert!(!hidden.is_public());
        assert!(std::ptr::eq(hidden.element_class(), app.load_class("pkg/Hidden")?));
        Ok(())
    }
}
