use super::{Insn, Next};
use crate::jvm::{opcode, BinaryName, Error};
use crate::runtime::{Runtime, Thread, Value};
use std::rc::Rc;

/// `if*`, `if_icmp*`, `if_acmp*`, `ifnull`, and `ifnonnull`
pub fn conditional_branch<'g>(
    thread: &mut Thread<'g>,
    op: u8,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    let taken = match op {
        IFEQ..=IFLE => {
            let value = frame.pop_int()?;
            match op {
                IFEQ => value == 0,
                IFNE => value != 0,
                IFLT => value < 0,
                IFGE => value >= 0,
                IFGT => value > 0,
                _ => value <= 0,
            }
        }
        IF_ICMPEQ..=IF_ICMPLE => {
            let rhs = frame.pop_int()?;
            let lhs = frame.pop_int()?;
            match op {
                IF_ICMPEQ => lhs == rhs,
                IF_ICMPNE => lhs != rhs,
                IF_ICMPLT => lhs < rhs,
                IF_ICMPGE => lhs >= rhs,
                IF_ICMPGT => lhs > rhs,
                _ => lhs <= rhs,
            }
        }
        IF_ACMPEQ | IF_ACMPNE => {
            let rhs = frame.pop_reference()?;
            let lhs = frame.pop_reference()?;
            let same = match (&lhs, &rhs) {
                (Some(lhs), Some(rhs)) => Rc::ptr_eq(lhs, rhs),
                (None, None) => true,
                _ => false,
            };
            same == (op == IF_ACMPEQ)
        }
        IFNULL => frame.pop_reference()?.is_none(),
        IFNONNULL => frame.pop_reference()?.is_some(),
        _ => return Err(Error::Internal(format!("Not a branch: {}", name(op)))),
    };

    if taken {
        Ok(Next::Jump(insn.branch_target(insn.i16(1)? as i32)?))
    } else {
        Ok(Next::Advance(3))
    }
}

/// `goto`, `goto_w`, `jsr`, and `jsr_w`
///
/// Subroutines don't get a frame: `jsr` just pushes the address of the next instruction for
/// `ret` to jump back to.
pub fn jump<'g>(thread: &mut Thread<'g>, op: u8, insn: Insn<'g>) -> Result<Next, Error> {
    use opcode::*;

    let (offset, len) = match op {
        GOTO | JSR => (insn.i16(1)? as i32, 3),
        _ => (insn.i32(1)?, 5),
    };
    let target = insn.branch_target(offset)?;
    if op == JSR || op == JSR_W {
        thread.push(Value::ReturnAddress(insn.pc + len))?;
    }
    Ok(Next::Jump(target))
}

pub fn ret<'g>(thread: &mut Thread<'g>, index: usize) -> Result<Next, Error> {
    let address = thread.local(index)?.as_return_address()?;
    Ok(Next::Jump(address))
}

/// Offset from the opcode to the first operand of a switch (operands are 4-byte aligned)
fn switch_operands(insn: &Insn<'_>) -> usize {
    1 + (4 - (insn.pc + 1) % 4) % 4
}

pub fn table_switch<'g>(thread: &mut Thread<'g>, insn: Insn<'g>) -> Result<Next, Error> {
    let base = switch_operands(&insn);
    let default = insn.i32(base)?;
    let low = insn.i32(base + 4)?;
    let high = insn.i32(base + 8)?;
    if low > high {
        return Err(Error::Internal(format!(
            "tableswitch at {} has low {} above high {}",
            insn.pc, low, high
        )));
    }

    let key = thread.frame_mut()?.pop_int()?;
    let offset = if key < low || key > high {
        default
    } else {
        let entry = (key as i64 - low as i64) as usize;
        insn.i32(base + 12 + 4 * entry)?
    };
    Ok(Next::Jump(insn.branch_target(offset)?))
}

pub fn lookup_switch<'g>(thread: &mut Thread<'g>, insn: Insn<'g>) -> Result<Next, Error> {
    let base = switch_operands(&insn);
    let default = insn.i32(base)?;
    let pairs = insn.i32(base + 4)?;
    if pairs < 0 {
        return Err(Error::Internal(format!(
            "lookupswitch at {} has {} pairs",
            insn.pc, pairs
        )));
    }

    let key = thread.frame_mut()?.pop_int()?;
    let mut offset = default;
    for pair in 0..pairs as usize {
        let pair_base = base + 8 + 8 * pair;
        if insn.i32(pair_base)? == key {
            offset = insn.i32(pair_base + 4)?;
            break;
        }
    }
    Ok(Next::Jump(insn.branch_target(offset)?))
}

/// `ireturn`, `lreturn`, `freturn`, `dreturn`, `areturn`, and `return`
///
/// The caller's pc is set from the returning frame, so there is nothing left to advance. A
/// synchronized method must still own its monitor when it returns.
pub fn return_from<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>, op: u8) -> Result<Next, Error> {
    use opcode::*;

    if thread.lost_frame_monitor()? {
        runtime.throw_new(
            thread,
            &BinaryName::ILLEGALMONITORSTATEEXCEPTION,
            Some("current thread is not owner"),
        )?;
        return Ok(Next::Stay);
    }

    match op {
        IRETURN => {
            let value = thread.pop()?.as_int()?;
            thread.return_value(Value::Int(value))?;
        }
        FRETURN => {
            let value = thread.pop()?.as_float()?;
            thread.return_value(Value::Float(value))?;
        }
        ARETURN => {
            let value = thread.pop()?.as_reference()?;
            thread.return_value(Value::from_reference(value))?;
        }
        LRETURN | DRETURN => {
            let value = thread.pop64()?;
            thread.return_value64(value)?;
        }
        RETURN => thread.return_void()?,
        _ => return Err(Error::Internal(format!("Not a return: {}", name(op)))),
    }
    Ok(Next::Stay)
}
