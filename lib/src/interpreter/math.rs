use super::Next;
use crate::jvm::{opcode, BinaryName, Error};
use crate::runtime::{Runtime, Thread, Value};

/// Arithmetic, negation, shift, and bitwise instructions
///
/// Integer arithmetic wraps. Only integer division and remainder can throw (on a zero divisor).
pub fn arithmetic<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    op: u8,
) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let result = match op {
        IADD | ISUB | IMUL | IDIV | IREM | IAND | IOR | IXOR | ISHL | ISHR | IUSHR => {
            let rhs = frame.pop_int()?;
            let lhs = frame.pop_int()?;
            if rhs == 0 && (op == IDIV || op == IREM) {
                return divide_by_zero(runtime, thread);
            }
            Value::Int(match op {
                IADD => lhs.wrapping_add(rhs),
                ISUB => lhs.wrapping_sub(rhs),
                IMUL => lhs.wrapping_mul(rhs),
                IDIV => lhs.wrapping_div(rhs),
                IREM => lhs.wrapping_rem(rhs),
                IAND => lhs & rhs,
                IOR => lhs | rhs,
                IXOR => lhs ^ rhs,
                ISHL => lhs.wrapping_shl(rhs as u32 & 0x1f),
                ISHR => lhs.wrapping_shr(rhs as u32 & 0x1f),
                _ => ((lhs as u32) >> (rhs as u32 & 0x1f)) as i32,
            })
        }
        LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR => {
            let rhs = frame.pop_long()?;
            let lhs = frame.pop_long()?;
            if rhs == 0 && (op == LDIV || op == LREM) {
                return divide_by_zero(runtime, thread);
            }
            Value::Long(match op {
                LADD => lhs.wrapping_add(rhs),
                LSUB => lhs.wrapping_sub(rhs),
                LMUL => lhs.wrapping_mul(rhs),
                LDIV => lhs.wrapping_div(rhs),
                LREM => lhs.wrapping_rem(rhs),
                LAND => lhs & rhs,
                LOR => lhs | rhs,
                _ => lhs ^ rhs,
            })
        }
        LSHL | LSHR | LUSHR => {
            let distance = frame.pop_int()? as u32 & 0x3f;
            let value = frame.pop_long()?;
            Value::Long(match op {
                LSHL => value.wrapping_shl(distance),
                LSHR => value.wrapping_shr(distance),
                _ => ((value as u64) >> distance) as i64,
            })
        }
        FADD | FSUB | FMUL | FDIV | FREM => {
            let rhs = frame.pop_float()?;
            let lhs = frame.pop_float()?;
            Value::Float(match op {
                FADD => lhs + rhs,
                FSUB => lhs - rhs,
                FMUL => lhs * rhs,
                FDIV => lhs / rhs,
                _ => lhs % rhs,
            })
        }
        DADD | DSUB | DMUL | DDIV | DREM => {
            let rhs = frame.pop_double()?;
            let lhs = frame.pop_double()?;
            Value::Double(match op {
                DADD => lhs + rhs,
                DSUB => lhs - rhs,
                DMUL => lhs * rhs,
                DDIV => lhs / rhs,
                _ => lhs % rhs,
            })
        }
        INEG => Value::Int(frame.pop_int()?.wrapping_neg()),
        LNEG => Value::Long(frame.pop_long()?.wrapping_neg()),
        FNEG => Value::Float(-frame.pop_float()?),
        DNEG => Value::Double(-frame.pop_double()?),
        _ => {
            return Err(Error::Internal(format!(
                "Not an arithmetic instruction: {}",
                name(op)
            )))
        }
    };
    frame.push(result)?;
    Ok(Next::Advance(1))
}

fn divide_by_zero<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<Next, Error> {
    runtime.throw_new(thread, &BinaryName::ARITHMETICEXCEPTION, Some("/ by zero"))?;
    Ok(Next::Stay)
}
