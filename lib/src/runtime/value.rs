use super::Object;
use crate::jvm::{BaseType, BinaryName, Error, FieldType};
use std::fmt;
use std::rc::Rc;

/// Shared reference to a heap object (instance or array)
///
/// Objects are reclaimed by reference counting: cycles leak, which is acceptable since there is
/// no collector.
pub type ObjectRef<'g> = Rc<Object<'g>>;

/// Value in a local variable slot, an operand stack slot, a field, or an array element
///
/// Longs and doubles are category 2: on the operand stack and in locals they are always followed
/// by a `Top` slot, so that slot arithmetic matches the `max_stack`/`max_locals` of the code.
#[derive(Clone)]
pub enum Value<'g> {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Object(ObjectRef<'g>),

    /// Pushed by `jsr`/`jsr_w` and consumed by `ret`
    ReturnAddress(usize),

    /// Second half of a category 2 value, or an unset local
    Top,
}

impl<'g> Value<'g> {
    /// Does this value take up two slots?
    pub fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    /// Initial value of a field of the given type
    pub fn default_for(descriptor: &FieldType<BinaryName>) -> Value<'g> {
        match descriptor {
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            FieldType::Base(_) => Value::Int(0),
            FieldType::Ref(_) => Value::Null,
        }
    }

    pub fn from_reference(reference: Option<ObjectRef<'g>>) -> Value<'g> {
        match reference {
            Some(object) => Value::Object(object),
            None => Value::Null,
        }
    }

    pub fn as_int(&self) -> Result<i32, Error> {
        match self {
            Value::Int(int) => Ok(*int),
            other => Err(mismatch("int", other)),
        }
    }

    pub fn as_long(&self) -> Result<i64, Error> {
        match self {
            Value::Long(long) => Ok(*long),
            other => Err(mismatch("long", other)),
        }
    }

    pub fn as_float(&self) -> Result<f32, Error> {
        match self {
            Value::Float(float) => Ok(*float),
            other => Err(mismatch("float", other)),
        }
    }

    pub fn as_double(&self) -> Result<f64, Error> {
        match self {
            Value::Double(double) => Ok(*double),
            other => Err(mismatch("double", other)),
        }
    }

    /// Reference value (`None` for `null`)
    pub fn as_reference(&self) -> Result<Option<ObjectRef<'g>>, Error> {
        match self {
            Value::Null => Ok(None),
            Value::Object(object) => Ok(Some(object.clone())),
            other => Err(mismatch("reference", other)),
        }
    }

    pub fn as_return_address(&self) -> Result<usize, Error> {
        match self {
            Value::ReturnAddress(address) => Ok(*address),
            other => Err(mismatch("returnAddress", other)),
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> Error {
    Error::Internal(format!("Expected {} value, found {:?}", expected, found))
}

impl<'g> fmt::Debug for Value<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(int) => write!(f, "{}", int),
            Value::Long(long) => write!(f, "{}L", long),
            Value::Float(float) => write!(f, "{:?}f", float),
            Value::Double(double) => write!(f, "{:?}d", double),
            Value::Null => f.write_str("null"),
            Value::Object(object) => write!(f, "{:?}", object),
            Value::ReturnAddress(address) => write!(f, "ret@{}", address),
            Value::Top => f.write_str("top"),
        }
    }
}
