use super::{Insn, Next};
use crate::jvm::class_file::{Constant, ConstantIndex};
use crate::jvm::{opcode, BinaryName, Error};
use crate::runtime::{Runtime, RuntimeConstant, Thread, Value};

/// `nop`, `aconst_null`, the `*const_*` family, `bipush`, and `sipush`
pub fn push_constant<'g>(thread: &mut Thread<'g>, op: u8, insn: Insn<'g>) -> Result<Next, Error> {
    use opcode::*;

    let (value, len) = match op {
        NOP => return Ok(Next::Advance(1)),
        ACONST_NULL => (Value::Null, 1),
        ICONST_M1..=ICONST_5 => (Value::Int(op as i32 - ICONST_0 as i32), 1),
        LCONST_0 | LCONST_1 => (Value::Long((op - LCONST_0) as i64), 1),
        FCONST_0..=FCONST_2 => (Value::Float((op - FCONST_0) as f32), 1),
        DCONST_0 | DCONST_1 => (Value::Double((op - DCONST_0) as f64), 1),
        BIPUSH => (Value::Int(insn.i8(1)? as i32), 2),
        SIPUSH => (Value::Int(insn.i16(1)? as i32), 3),
        _ => return Err(Error::Internal(format!("Not a constant push: {}", name(op)))),
    };
    thread.push(value)?;
    Ok(Next::Advance(len))
}

/// `ldc`, `ldc_w`, and `ldc2_w`
pub fn ldc<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    op: u8,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    let (index, len) = if op == opcode::LDC {
        (ConstantIndex(insn.u8(1)? as u16), 2)
    } else {
        (ConstantIndex(insn.u16(1)?), 3)
    };
    let class = thread.frame()?.class();

    // Method handles and dynamic constants need `java/lang/invoke`, which isn't modelled
    match class.constant_pool.raw(index)? {
        Constant::MethodHandle { .. } | Constant::MethodType { .. } => {
            runtime.throw_new(
                thread,
                &BinaryName::UNSUPPORTEDOPERATIONEXCEPTION,
                Some("method handle constants are not supported"),
            )?;
            return Ok(Next::Stay);
        }
        Constant::Dynamic { .. } => {
            runtime.throw_new(
                thread,
                &BinaryName::BOOTSTRAPMETHODERROR,
                Some("dynamically-computed constants are not supported"),
            )?;
            return Ok(Next::Stay);
        }
        _ => (),
    }

    let constant = try_guest!(
        runtime,
        thread,
        class.constant_pool.resolve(runtime, class, index)
    );
    let value = match (op == opcode::LDC2_W, constant) {
        (false, RuntimeConstant::Integer(int)) => Value::Int(int),
        (false, RuntimeConstant::Float(float)) => Value::Float(float),
        (false, RuntimeConstant::String(string)) => Value::Object(string),
        (false, RuntimeConstant::Class(loaded)) => Value::Object(runtime.mirror(loaded)?),
        (true, RuntimeConstant::Long(long)) => Value::Long(long),
        (true, RuntimeConstant::Double(double)) => Value::Double(double),
        _ => {
            let message = format!(
                "Constant #{} can't be loaded by {} in {}",
                index.0,
                opcode::name(op),
                thread.frame()?.method
            );
            runtime.throw_error(thread, Error::Format(message))?;
            return Ok(Next::Stay);
        }
    };
    thread.push(value)?;
    Ok(Next::Advance(len))
}
