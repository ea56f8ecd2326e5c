use super::{resolve_constant, Insn, Next};
use crate::jvm::{BaseType, BinaryName, Error, FieldType, Name, UnqualifiedName};
use crate::runtime::{
    ensure_initialized, FieldData, InitProgress, Runtime, RuntimeConstant, Thread, Value,
};

fn resolve_field<'g>(
    runtime: &Runtime<'g>,
    thread: &Thread<'g>,
    index: u16,
) -> Result<&'g FieldData<'g>, Error> {
    match resolve_constant(runtime, thread, index)? {
        RuntimeConstant::Field(field) => Ok(field),
        _ => Err(Error::Format(format!("Expected a Fieldref constant at #{}", index))),
    }
}

/// Throw an `IncompatibleClassChangeError` if the field isn't static (or is, when it shouldn't)
fn check_static<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    field: &FieldData<'g>,
    expect_static: bool,
) -> Result<bool, Error> {
    if field.is_static() == expect_static {
        return Ok(true);
    }
    let message = if expect_static {
        format!("Expected static field {}", field)
    } else {
        format!("Expected non-static field {}", field)
    };
    runtime.throw_new(
        thread,
        &BinaryName::INCOMPATIBLECLASSCHANGEERROR,
        Some(&message),
    )?;
    Ok(false)
}

/// Final fields may only be assigned by the initializer of their declaring class
///
/// That is `<clinit>` for static fields and `<init>` for instance fields.
fn check_final<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    field: &FieldData<'g>,
    initializer: &UnqualifiedName,
) -> Result<bool, Error> {
    if !field.is_final() {
        return Ok(true);
    }
    let method = thread.frame()?.method;
    if std::ptr::eq(method.class, field.class) && &method.name == initializer {
        return Ok(true);
    }
    let message = format!(
        "Update to final field {} attempted from method {}",
        field,
        method.name.as_str()
    );
    runtime.throw_new(thread, &BinaryName::ILLEGALACCESSERROR, Some(&message))?;
    Ok(false)
}

/// Narrow an `int` to the type of a `boolean`, `byte`, `char`, or `short` field
fn narrow<'g>(field: &FieldData<'g>, value: Value<'g>) -> Result<Value<'g>, Error> {
    Ok(match &field.descriptor {
        FieldType::Base(BaseType::Boolean) => Value::Int(value.as_int()? & 1),
        FieldType::Base(BaseType::Byte) => Value::Int(value.as_int()? as i8 as i32),
        FieldType::Base(BaseType::Char) => Value::Int(value.as_int()? as u16 as i32),
        FieldType::Base(BaseType::Short) => Value::Int(value.as_int()? as i16 as i32),
        _ => value,
    })
}

pub fn get_static<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let field = try_guest!(runtime, thread, resolve_field(runtime, thread, insn.u16(1)?));
    if !check_static(runtime, thread, field, true)? {
        return Ok(Next::Stay);
    }
    if ensure_initialized(runtime, thread, field.class)? != InitProgress::Ready {
        return Ok(Next::Stay);
    }

    let value = field.class.get_static(field)?;
    thread.push(value)?;
    Ok(Next::Advance(3))
}

pub fn put_static<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let field = try_guest!(runtime, thread, resolve_field(runtime, thread, insn.u16(1)?));
    if !check_static(runtime, thread, field, true)?
        || !check_final(runtime, thread, field, &UnqualifiedName::CLINIT)?
    {
        return Ok(Next::Stay);
    }
    if ensure_initialized(runtime, thread, field.class)? != InitProgress::Ready {
        return Ok(Next::Stay);
    }

    let value = narrow(field, thread.pop()?)?;
    field.class.set_static(field, value)?;
    Ok(Next::Advance(3))
}

pub fn get_field<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let field = try_guest!(runtime, thread, resolve_field(runtime, thread, insn.u16(1)?));
    if !check_static(runtime, thread, field, false)? {
        return Ok(Next::Stay);
    }

    let object = match thread.pop()?.as_reference()? {
        Some(object) => object,
        None => {
            runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
            return Ok(Next::Stay);
        }
    };
    let value = object.get_field(field.slot)?;
    thread.push(value)?;
    Ok(Next::Advance(3))
}

pub fn put_field<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let field = try_guest!(runtime, thread, resolve_field(runtime, thread, insn.u16(1)?));
    if !check_static(runtime, thread, field, false)?
        || !check_final(runtime, thread, field, &UnqualifiedName::INIT)?
    {
        return Ok(Next::Stay);
    }

    let value = narrow(field, thread.pop()?)?;
    let object = match thread.pop()?.as_reference()? {
        Some(object) => object,
        None => {
            runtime.throw_new(thread, &BinaryName::NULLPOINTEREXCEPTION, None)?;
            return Ok(Next::Stay);
        }
    };
    object.set_field(field.slot, value)?;
    Ok(Next::Advance(3))
}
