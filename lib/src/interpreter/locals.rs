//! Moving values between locals and the operand stack

use super::Next;
use crate::jvm::Error;
use crate::runtime::{Thread, Value};

/// Push a local, whatever its kind (the verifier would have checked the typed opcodes)
pub fn load<'g>(thread: &mut Thread<'g>, index: usize, len: usize) -> Result<Next, Error> {
    let frame = thread.frame_mut()?;
    let value = frame.load(index)?;
    frame.push(value)?;
    Ok(Next::Advance(len))
}

/// Pop into a local
///
/// `astore` also accepts the return addresses pushed by `jsr`.
pub fn store<'g>(thread: &mut Thread<'g>, index: usize, len: usize) -> Result<Next, Error> {
    let frame = thread.frame_mut()?;
    let value = frame.pop()?;
    frame.store(index, value)?;
    Ok(Next::Advance(len))
}

pub fn iinc<'g>(
    thread: &mut Thread<'g>,
    index: usize,
    increment: i32,
    len: usize,
) -> Result<Next, Error> {
    let frame = thread.frame_mut()?;
    let value = frame.load(index)?.as_int()?;
    frame.store(index, Value::Int(value.wrapping_add(increment)))?;
    Ok(Next::Advance(len))
}
