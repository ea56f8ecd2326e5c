use super::{locals, Insn, Next};
use crate::jvm::{opcode, Error};
use crate::runtime::Thread;

/// `wide`: a local variable instruction with a 16-bit index
pub fn wide<'g>(thread: &mut Thread<'g>, insn: Insn<'g>) -> Result<Next, Error> {
    use opcode::*;

    let op = insn.u8(1)?;
    let index = insn.u16(2)? as usize;
    match op {
        ILOAD..=ALOAD => locals::load(thread, index, 4),
        ISTORE..=ASTORE => locals::store(thread, index, 4),
        IINC => locals::iinc(thread, index, insn.i16(4)? as i32, 6),
        RET => super::control::ret(thread, index),
        _ => Err(Error::Internal(format!(
            "{} can't be widened (at {})",
            name(op),
            insn.pc
        ))),
    }
}
