//! Bytecode interpreter
//!
//! Each call to [`step`] executes exactly one instruction (or one call into a native method) of
//! the top frame of a thread. Handlers are grouped by instruction family, and report what should
//! happen to the program counter through [`Next`].
//!
//! Instructions never suspend the host. When an instruction can't complete (the class it needs
//! is being initialized by another thread, a `<clinit>` frame had to be pushed first, a native
//! module is still loading), its handler leaves the pc where it is and the instruction runs again
//! once the thread gets scheduled next.

/// Unwrap a result, throwing errors with a guest counterpart into the thread
///
/// When the error is thrown, the enclosing handler returns `Next::Stay` (the unwinding has
/// already set the pc). Errors with no guest counterpart are returned as they are.
macro_rules! try_guest {
    ($runtime:expr, $thread:expr, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $runtime.throw_error($thread, err)?;
                return Ok(Next::Stay);
            }
        }
    };
}

mod arrays;
mod comparisons;
mod constants;
mod control;
mod conversions;
mod extended;
mod fields;
mod invoke;
mod locals;
mod math;
mod objects;
mod stack;

use crate::jvm::class_file::ConstantIndex;
use crate::jvm::{opcode, Error};
use crate::runtime::{ClassData, Runtime, RuntimeConstant, Thread, ThreadStatus};
use byteorder::{BigEndian, ByteOrder};

/// What to do with the program counter once an instruction has executed
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Next {
    /// Fall through to the next instruction, this many bytes further
    Advance(usize),

    /// Continue at an absolute offset in the code
    Jump(usize),

    /// Leave the pc alone (it was already updated, the frame changed, or the instruction must
    /// run again)
    Stay,
}

/// Instruction at some offset of a method's code, for reading immediate operands
#[derive(Copy, Clone)]
pub struct Insn<'g> {
    code: &'g [u8],
    pub pc: usize,
}

impl<'g> Insn<'g> {
    pub fn new(code: &'g [u8], pc: usize) -> Insn<'g> {
        Insn { code, pc }
    }

    pub fn opcode(&self) -> Result<u8, Error> {
        self.u8(0)
    }

    fn bytes(&self, offset: usize, len: usize) -> Result<&'g [u8], Error> {
        let start = self.pc + offset;
        self.code.get(start..start + len).ok_or_else(|| {
            Error::Internal(format!(
                "Instruction at {} is truncated (needs {} bytes at offset {})",
                self.pc, len, offset
            ))
        })
    }

    /// Unsigned byte at some offset from the opcode
    pub fn u8(&self, offset: usize) -> Result<u8, Error> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn i8(&self, offset: usize) -> Result<i8, Error> {
        Ok(self.u8(offset)? as i8)
    }

    pub fn u16(&self, offset: usize) -> Result<u16, Error> {
        Ok(BigEndian::read_u16(self.bytes(offset, 2)?))
    }

    pub fn i16(&self, offset: usize) -> Result<i16, Error> {
        Ok(BigEndian::read_i16(self.bytes(offset, 2)?))
    }

    pub fn i32(&self, offset: usize) -> Result<i32, Error> {
        Ok(BigEndian::read_i32(self.bytes(offset, 4)?))
    }

    /// Absolute target of a branch relative to this instruction
    pub fn branch_target(&self, offset: i32) -> Result<usize, Error> {
        let target = self.pc as i64 + offset as i64;
        if target < 0 || target as usize >= self.code.len() {
            return Err(Error::Internal(format!(
                "Branch from {} by {} leaves the code",
                self.pc, offset
            )));
        }
        Ok(target as usize)
    }
}

/// Resolve an entry in the constant pool of the class whose method is running
fn resolve_constant<'g>(
    runtime: &Runtime<'g>,
    thread: &Thread<'g>,
    index: u16,
) -> Result<RuntimeConstant<'g>, Error> {
    let class = thread.frame()?.class();
    class
        .constant_pool
        .resolve(runtime, class, ConstantIndex(index))
}

fn resolve_class<'g>(
    runtime: &Runtime<'g>,
    thread: &Thread<'g>,
    index: u16,
) -> Result<&'g ClassData<'g>, Error> {
    match resolve_constant(runtime, thread, index)? {
        RuntimeConstant::Class(class) => Ok(class),
        _ => Err(Error::Format(format!("Expected a Class constant at #{}", index))),
    }
}

/// Run a thread until it stops being runnable, its stack empties, or `quantum` instructions
/// have executed
pub fn run_for<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    quantum: usize,
) -> Result<(), Error> {
    for _ in 0..quantum {
        if thread.status() != ThreadStatus::Runnable || thread.depth() == 0 {
            break;
        }
        step(runtime, thread)?;
    }
    Ok(())
}

/// Execute one instruction of the top frame
pub fn step<'g>(runtime: &Runtime<'g>, thread: &mut Thread<'g>) -> Result<(), Error> {
    let frame = thread.frame()?;
    if let Some(native) = frame.native {
        log::trace!("Native {} on {:?}", frame.method, thread.name());
        return native(runtime, thread);
    }

    let method = frame.method;
    let code = method
        .code
        .as_ref()
        .ok_or_else(|| Error::Internal(format!("No code to run in {}", method)))?;
    let insn = Insn::new(&code.bytecode, frame.pc);
    let op = insn.opcode()?;
    log::trace!(
        "{:?} {} @{}: {}",
        thread.name(),
        method,
        insn.pc,
        opcode::name(op)
    );

    match execute(runtime, thread, op, insn)? {
        Next::Advance(len) => thread.set_pc(insn.pc + len),
        Next::Jump(target) => thread.set_pc(target),
        Next::Stay => Ok(()),
    }
}

fn execute<'g>(
    runtime: &Runtime<'g>,
    thread: &mut Thread<'g>,
    op: u8,
    insn: Insn<'g>,
) -> Result<Next, Error> {
    use opcode::*;

    match op {
        NOP..=SIPUSH => constants::push_constant(thread, op, insn),
        LDC | LDC_W | LDC2_W => constants::ldc(runtime, thread, op, insn),

        ILOAD..=ALOAD => locals::load(thread, insn.u8(1)? as usize, 2),
        ILOAD_0..=ALOAD_3 => locals::load(thread, ((op - ILOAD_0) % 4) as usize, 1),
        ISTORE..=ASTORE => locals::store(thread, insn.u8(1)? as usize, 2),
        ISTORE_0..=ASTORE_3 => locals::store(thread, ((op - ISTORE_0) % 4) as usize, 1),
        IINC => locals::iinc(thread, insn.u8(1)? as usize, insn.i8(2)? as i32, 3),

        IALOAD..=SALOAD => arrays::load_element(runtime, thread, op),
        IASTORE..=SASTORE => arrays::store_element(runtime, thread, op),
        NEWARRAY => arrays::new_array(runtime, thread, insn),
        ANEWARRAY => arrays::new_reference_array(runtime, thread, insn),
        MULTIANEWARRAY => arrays::new_multi_array(runtime, thread, insn),
        ARRAYLENGTH => arrays::array_length(runtime, thread),

        POP..=SWAP => stack::shuffle(thread, op),

        IADD..=LXOR => math::arithmetic(runtime, thread, op),
        I2L..=D2F | I2B..=I2S => conversions::convert(thread, op),
        LCMP..=DCMPG => comparisons::compare(thread, op),

        IFEQ..=IF_ACMPNE | IFNULL | IFNONNULL => control::conditional_branch(thread, op, insn),
        GOTO | GOTO_W | JSR | JSR_W => control::jump(thread, op, insn),
        RET => control::ret(thread, insn.u8(1)? as usize),
        TABLESWITCH => control::table_switch(thread, insn),
        LOOKUPSWITCH => control::lookup_switch(thread, insn),
        IRETURN..=RETURN => control::return_from(runtime, thread, op),

        GETSTATIC => fields::get_static(runtime, thread, insn),
        PUTSTATIC => fields::put_static(runtime, thread, insn),
        GETFIELD => fields::get_field(runtime, thread, insn),
        PUTFIELD => fields::put_field(runtime, thread, insn),

        INVOKEVIRTUAL => invoke::invoke_virtual(runtime, thread, insn),
        INVOKESPECIAL => invoke::invoke_special(runtime, thread, insn),
        INVOKESTATIC => invoke::invoke_static(runtime, thread, insn),
        INVOKEINTERFACE => invoke::invoke_interface(runtime, thread, insn),
        INVOKEDYNAMIC => invoke::invoke_dynamic(runtime, thread, insn),

        NEW => objects::new(runtime, thread, insn),
        ATHROW => objects::athrow(runtime, thread),
        CHECKCAST => objects::checkcast(runtime, thread, insn),
        INSTANCEOF => objects::instance_of(runtime, thread, insn),
        MONITORENTER => objects::monitor_enter(runtime, thread),
        MONITOREXIT => objects::monitor_exit(runtime, thread),

        WIDE => extended::wide(thread, insn),

        _ => Err(Error::Internal(format!(
            "Unsupported opcode {:#04x} ({}) at {}",
            op,
            opcode::name(op),
            insn.pc
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_big_endian_operands() -> Result<(), Error> {
        let code = [0x00, 0x10, 0xff, 0x12, 0x34, 0x80, 0x00, 0x00, 0x01];
        let insn = Insn::new(&code, 1);
        assert_eq!(insn.opcode()?, 0x10);
        assert_eq!(insn.i8(1)?, -1);
        assert_eq!(insn.u16(2)?, 0x1234);
        assert_eq!(insn.i32(4)?, i32::MIN + 1);
        assert!(matches!(insn.u16(7), Err(Error::Internal(_))));
        Ok(())
    }

    #[test]
    fn branch_targets_stay_in_the_code() {
        let code = [0u8; 16];
        let insn = Insn::new(&code, 4);
        assert_eq!(insn.branch_target(10).unwrap(), 14);
        assert_eq!(insn.branch_target(-4).unwrap(), 0);
        assert!(insn.branch_target(-5).is_err());
        assert!(insn.branch_target(12).is_err());
    }
}
