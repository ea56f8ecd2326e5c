use super::{resolve_class, Insn, Next};
use crate::jvm::{opcode, BaseType, BinaryName, Error, RenderDescriptor};
use crate::runtime::{
    ArrayData, ClassData, ClassKind, Object, ObjectRef, Runtime, StackFrame, Thread, Value,
};

/// Array class whose elements are of the given class
///
/// The array class is defined by the loader of its innermost component.
fn array_class_of<'g>(component: &'g ClassData<'g>) -> Result<&'g ClassData<'g>, Error> {
    let name = match component.kind {
        ClassKind::Primitive(base) => format!("[{}", base.render()),
        ClassKind::Array { .. } => format!("[{}", component.name),
        ClassKind::Scalar => format!("[L{};", component.name),
    };
    component.loader.load_class(&name)
}

fn null_pointer<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
    Ok(Next::Stay)
}

/// Validate an array count, throwing if it is negative or above `Settings::max_array_length`
fn check_count<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    count: i32,
) -> Result<Option<usize>, Error> {
    if count < 0 {
        let message = count.to_string();
        runtime.throw_new(thread, &BinaryName::NEGATIVEARRAYSIZEEXCEPTION, Some(&message))?;
        return Ok(None);
    }
    if (count as usize) > runtime.settings.max_array_length {
        out_of_memory(runtime, thread, "Requested array size exceeds VM limit")?;
        return Ok(None);
    }
    Ok(Some(count as usize))
}

fn out_of_memory<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    message: &str,
) -> Result<(), Error> {
    runtime.throw_new(thread, &BinaryName::OUTOFMEMORYERROR, Some(message))
}

/// Check an index against the length of an array, throwing if it is out of bounds
fn check_index<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    array: &Object<'g>,
    index: i32,
) -> Result<Option<usize>, Error> {
    let length = array.array_length()?;
    if index >= 0 && (index as usize) < length {
        return Ok(Some(index as usize));
    }
    let message = format!("Index {} out of bounds for length {}", index, length);
    runtime.throw_new(
        thread,
        &BinaryName::ARRAYINDEXOUTOFBOUNDSEXCEPTION,
        Some(&message),
    )?;
    Ok(None)
}

fn element_mismatch(op: u8, array: &Object<'_>) -> Error {
    Error::Internal(format!(
        "{} used on an array of class {}",
        opcode::name(op),
        array.class.name
    ))
}

/// `*aload` instructions
pub fn load_element<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    op: u8,
) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let index = frame.pop_int()?;
    let array = match frame.pop_reference()? {
        Some(array) => array,
        None => return null_pointer(runtime, thread),
    };
    let index = match check_index(runtime, thread, &array, index)? {
        Some(index) => index,
        None => return Ok(Next::Stay),
    };

    let element = match (op, &*array.array()?) {
        (IALOAD, ArrayData::Int(elems)) => Value::Int(elems[index]),
        (LALOAD, ArrayData::Long(elems)) => Value::Long(elems[index]),
        (FALOAD, ArrayData::Float(elems)) => Value::Float(elems[index]),
        (DALOAD, ArrayData::Double(elems)) => Value::Double(elems[index]),
        (AALOAD, ArrayData::Reference(elems)) => Value::from_reference(elems[index].clone()),
        (BALOAD, ArrayData::Byte(elems)) => Value::Int(elems[index] as i32),
        (CALOAD, ArrayData::Char(elems)) => Value::Int(elems[index] as i32),
        (SALOAD, ArrayData::Short(elems)) => Value::Int(elems[index] as i32),
        _ => return Err(element_mismatch(op, &array)),
    };
    thread.push(element)?;
    Ok(Next::Advance(1))
}

/// `*astore` instructions
///
/// Values are narrowed to the element type (`bastore` into a `boolean[]` keeps only the low
/// bit). `aastore` checks that the value is assignable to the component class.
pub fn store_element<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    op: u8,
) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let value = frame.pop()?;
    let index = frame.pop_int()?;
    let array = match frame.pop_reference()? {
        Some(array) => array,
        None => return null_pointer(runtime, thread),
    };
    let index = match check_index(runtime, thread, &array, index)? {
        Some(index) => index,
        None => return Ok(Next::Stay),
    };

    if op == AASTORE {
        if let Some(stored) = value.as_reference()? {
            let component = array
                .class
                .component()
                .ok_or_else(|| element_mismatch(op, &array))?;
            if !stored.class.is_assignable_to(component) {
                let message = stored.class.name.to_string();
                runtime.throw_new(thread, &BinaryName::ARRAYSTOREEXCEPTION, Some(&message))?;
                return Ok(Next::Stay);
            }
        }
    }

    let is_boolean = matches!(
        array.class.component().map(|component| component.kind),
        Some(ClassKind::Primitive(BaseType::Boolean))
    );
    match (op, &mut *array.array_mut()?) {
        (IASTORE, ArrayData::Int(elems)) => elems[index] = value.as_int()?,
        (LASTORE, ArrayData::Long(elems)) => elems[index] = value.as_long()?,
        (FASTORE, ArrayData::Float(elems)) => elems[index] = value.as_float()?,
        (DASTORE, ArrayData::Double(elems)) => elems[index] = value.as_double()?,
        (AASTORE, ArrayData::Reference(elems)) => elems[index] = value.as_reference()?,
        (BASTORE, ArrayData::Byte(elems)) if is_boolean => {
            elems[index] = (value.as_int()? & 1) as i8
        }
        (BASTORE, ArrayData::Byte(elems)) => elems[index] = value.as_int()? as i8,
        (CASTORE, ArrayData::Char(elems)) => elems[index] = value.as_int()? as u16,
        (SASTORE, ArrayData::Short(elems)) => elems[index] = value.as_int()? as i16,
        _ => return Err(element_mismatch(op, &array)),
    }
    Ok(Next::Advance(1))
}

/// `newarray`: array of a primitive type
pub fn new_array<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let code = insn.u8(1)?;
    let base = BaseType::from_array_type_code(code)
        .ok_or_else(|| Error::Internal(format!("Invalid newarray type code {}", code)))?;
    let count = thread.frame_mut()?.pop_int()?;
    let count = match check_count(runtime, thread, count)? {
        Some(count) => count,
        None => return Ok(Next::Stay),
    };

    let component = runtime.bootstrap_loader().primitive(base);
    let class = array_class_of(component)?;
    let array = Object::new_array(class, ArrayData::new(component, count));
    thread.push(Value::Object(array))?;
    Ok(Next::Advance(2))
}

/// `anewarray`: array of references
pub fn new_reference_array<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let component = try_guest!(runtime, thread, resolve_class(runtime, thread, insn.u16(1)?));
    let class = try_guest!(runtime, thread, array_class_of(component));
    let count = thread.frame_mut()?.pop_int()?;
    let count = match check_count(runtime, thread, count)? {
        Some(count) => count,
        None => return Ok(Next::Stay),
    };

    let array = Object::new_array(class, ArrayData::new(component, count));
    thread.push(Value::Object(array))?;
    Ok(Next::Advance(3))
}

/// `multianewarray`
///
/// Every count is checked before anything is allocated. Only the dimensions which were given
/// counts get allocated, and a zero count stops allocation of everything below it.
pub fn new_multi_array<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let class = try_guest!(runtime, thread, resolve_class(runtime, thread, insn.u16(1)?));
    let dimensions = insn.u8(3)? as usize;
    if dimensions == 0 {
        return Err(Error::Internal(String::from("multianewarray with no dimensions")));
    }

    let mut counts = Vec::with_capacity(dimensions);
    for count in pop_counts(thread.frame_mut()?, dimensions)? {
        match check_count(runtime, thread, count)? {
            Some(count) => counts.push(count),
            None => return Ok(Next::Stay),
        }
    }
    if total_elements(&counts) > runtime.settings.max_array_length {
        out_of_memory(runtime, thread, "Java heap space")?;
        return Ok(Next::Stay);
    }

    let array = allocate(class, &counts)?;
    thread.push(Value::Object(array))?;
    Ok(Next::Advance(4))
}

/// Pop dimension counts, outermost first
fn pop_counts(frame: &mut StackFrame<'_>, dimensions: usize) -> Result<Vec<i32>, Error> {
    let mut counts = Vec::with_capacity(dimensions);
    for _ in 0..dimensions {
        counts.push(frame.pop_int()?);
    }
    counts.reverse();
    Ok(counts)
}

/// Elements allocated over every dimension, stopping below the first zero count
fn total_elements(counts: &[usize]) -> usize {
    let mut total = 0usize;
    let mut arrays = 1usize;
    for count in counts {
        arrays = arrays.saturating_mul(*count);
        total = total.saturating_add(arrays);
        if arrays == 0 {
            break;
        }
    }
    total
}

fn allocate<'g>(class: &'g ClassData<'g>, counts: &[usize]) -> Result<ObjectRef<'g>, Error> {
    let component = class
        .component()
        .ok_or_else(|| Error::Internal(format!("{} is not an array class", class.name)))?;
    let data = match counts {
        [] => return Err(Error::Internal(String::from("Allocating no dimensions"))),
        [count] => ArrayData::new(component, *count),
        [count, inner @ ..] => {
            let mut elements = Vec::with_capacity(*count);
            for _ in 0..*count {
                elements.push(Some(allocate(component, inner)?));
            }
            ArrayData::Reference(elements)
        }
    };
    Ok(Object::new_array(class, data))
}

pub fn array_length<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    let array = match thread.frame_mut()?.pop_reference()? {
        Some(array) => array,
        None => return null_pointer(runtime, thread),
    };
    let length = array.array_length()?;
    thread.push(Value::Int(length as i32))?;
    Ok(Next::Advance(1))
}
