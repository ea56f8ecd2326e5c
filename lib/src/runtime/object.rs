use super::{ClassData, ClassKind, Monitor, MonitorRef, ObjectRef, Value};
use crate::jvm::{BaseType, Error};
use std::any::Any;
use std::cell::{OnceCell, Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Heap object: either an instance of a scalar class or an array
pub struct Object<'g> {
    pub class: &'g ClassData<'g>,
    body: ObjectBody<'g>,
    monitor: OnceCell<MonitorRef>,
    natives: RefCell<NativeSlots<'g>>,
}

pub enum ObjectBody<'g> {
    /// One slot per instance field, laid out superclass fields first
    Instance(RefCell<Vec<Value<'g>>>),
    Array(RefCell<ArrayData<'g>>),
}

/// Homogeneous array storage (`boolean[]` shares the `byte[]` representation)
#[derive(Clone, Debug)]
pub enum ArrayData<'g> {
    Byte(Vec<i8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Reference(Vec<Option<ObjectRef<'g>>>),
}

impl<'g> ArrayData<'g> {
    /// Zero-filled storage for elements of the given component class
    pub fn new(component: &ClassData<'g>, length: usize) -> ArrayData<'g> {
        match component.kind {
            ClassKind::Primitive(BaseType::Boolean | BaseType::Byte) => {
                ArrayData::Byte(vec![0; length])
            }
            ClassKind::Primitive(BaseType::Char) => ArrayData::Char(vec![0; length]),
            ClassKind::Primitive(BaseType::Short) => ArrayData::Short(vec![0; length]),
            ClassKind::Primitive(BaseType::Int) => ArrayData::Int(vec![0; length]),
            ClassKind::Primitive(BaseType::Long) => ArrayData::Long(vec![0; length]),
            ClassKind::Primitive(BaseType::Float) => ArrayData::Float(vec![0.0; length]),
            ClassKind::Primitive(BaseType::Double) => ArrayData::Double(vec![0.0; length]),
            ClassKind::Scalar | ClassKind::Array { .. } => {
                ArrayData::Reference(vec![None; length])
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Byte(elems) => elems.len(),
            ArrayData::Char(elems) => elems.len(),
            ArrayData::Short(elems) => elems.len(),
            ArrayData::Int(elems) => elems.len(),
            ArrayData::Long(elems) => elems.len(),
            ArrayData::Float(elems) => elems.len(),
            ArrayData::Double(elems) => elems.len(),
            ArrayData::Reference(elems) => elems.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Extra host-side state attached to an object by natives
///
/// Keys are chosen by whoever sets them (eg. `"message"` on throwables created by the runtime).
pub type NativeSlots<'g> = HashMap<&'static str, NativeValue<'g>>;

#[derive(Clone)]
pub enum NativeValue<'g> {
    Class(&'g ClassData<'g>),
    Text(Rc<str>),
    Any(Rc<dyn Any>),
}

impl<'g> Object<'g> {
    /// Fresh instance with every field at its default value (no constructor is run)
    pub fn new_instance(class: &'g ClassData<'g>) -> ObjectRef<'g> {
        Rc::new(Object {
            class,
            body: ObjectBody::Instance(RefCell::new(class.instance_defaults.clone())),
            monitor: OnceCell::new(),
            natives: RefCell::new(HashMap::new()),
        })
    }

    pub fn new_array(class: &'g ClassData<'g>, data: ArrayData<'g>) -> ObjectRef<'g> {
        Rc::new(Object {
            class,
            body: ObjectBody::Array(RefCell::new(data)),
            monitor: OnceCell::new(),
            natives: RefCell::new(HashMap::new()),
        })
    }

    /// Shallow copy, with a fresh monitor
    pub fn shallow_clone(&self) -> ObjectRef<'g> {
        let body = match &self.body {
            ObjectBody::Instance(fields) => ObjectBody::Instance(RefCell::new(fields.borrow().clone())),
            ObjectBody::Array(data) => ObjectBody::Array(RefCell::new(data.borrow().clone())),
        };
        Rc::new(Object {
            class: self.class,
            body,
            monitor: OnceCell::new(),
            natives: RefCell::new(self.natives.borrow().clone()),
        })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.body, ObjectBody::Array(_))
    }

    pub fn get_field(&self, slot: usize) -> Result<Value<'g>, Error> {
        match &self.body {
            ObjectBody::Instance(fields) => fields
                .borrow()
                .get(slot)
                .cloned()
                .ok_or_else(|| self.bad_access(&format!("field slot {}", slot))),
            ObjectBody::Array(_) => Err(self.bad_access("fields")),
        }
    }

    pub fn set_field(&self, slot: usize, value: Value<'g>) -> Result<(), Error> {
        match &self.body {
            ObjectBody::Instance(fields) => match fields.borrow_mut().get_mut(slot) {
                Some(field) => {
                    *field = value;
                    Ok(())
                }
                None => Err(self.bad_access(&format!("field slot {}", slot))),
            },
            ObjectBody::Array(_) => Err(self.bad_access("fields")),
        }
    }

    pub fn array(&self) -> Result<Ref<'_, ArrayData<'g>>, Error> {
        match &self.body {
            ObjectBody::Array(data) => Ok(data.borrow()),
            ObjectBody::Instance(_) => Err(self.bad_access("array elements")),
        }
    }

    pub fn array_mut(&self) -> Result<RefMut<'_, ArrayData<'g>>, Error> {
        match &self.body {
            ObjectBody::Array(data) => Ok(data.borrow_mut()),
            ObjectBody::Instance(_) => Err(self.bad_access("array elements")),
        }
    }

    pub fn array_length(&self) -> Result<usize, Error> {
        self.array().map(|data| data.len())
    }

    /// Monitor of the object, created on first use
    pub fn monitor(&self) -> MonitorRef {
        self.monitor
            .get_or_init(|| Rc::new(RefCell::new(Monitor::new())))
            .clone()
    }

    /// Lock this object with an existing monitor instead of its own
    ///
    /// Has no effect once the object's monitor has been used.
    pub(crate) fn adopt_monitor(&self, monitor: MonitorRef) {
        let _ = self.monitor.set(monitor);
    }

    /// Identity hash code, stable for the lifetime of the object
    pub fn identity_hash(&self) -> i32 {
        let address = self as *const Object as usize;
        (address >> 3) as i32
    }

    pub fn native(&self, key: &str) -> Option<NativeValue<'g>> {
        self.natives.borrow().get(key).cloned()
    }

    pub fn set_native(&self, key: &'static str, value: NativeValue<'g>) {
        self.natives.borrow_mut().insert(key, value);
    }

    /// Text stored in a native slot, if any
    pub fn native_text(&self, key: &str) -> Option<Rc<str>> {
        match self.native(key) {
            Some(NativeValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    fn bad_access(&self, what: &str) -> Error {
        Error::Internal(format!("Object of class {} has no {}", self.class.name, what))
    }
}

impl<'g> fmt::Debug for Object<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:x}", self.class.name, self.identity_hash())
    }
}
