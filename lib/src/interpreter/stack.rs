//! Stack shuffling instructions
//!
//! These work on raw slots. A `long` or `double` is two slots (the value and a `Top`), so
//! `dup2` copies either one category 2 value or two category 1 values, as required.

use super::Next;
use crate::jvm::{opcode, Error};
use crate::runtime::{StackFrame, Thread};

pub fn shuffle<'g>(thread: &mut Thread<'g>, op: u8) -> Result<Next, Error> {
    use opcode::*;

    let frame = thread.frame_mut()?;
    match op {
        POP => {
            frame.pop_slot()?;
        }
        POP2 => {
            frame.pop_slot()?;
            frame.pop_slot()?;
        }
        DUP => duplicate(frame, 1, 0)?,
        DUP_X1 => duplicate(frame, 1, 1)?,
        DUP_X2 => duplicate(frame, 1, 2)?,
        DUP2 => duplicate(frame, 2, 0)?,
        DUP2_X1 => duplicate(frame, 2, 1)?,
        DUP2_X2 => duplicate(frame, 2, 2)?,
        SWAP => {
            let top = frame.pop_slot()?;
            let below = frame.pop_slot()?;
            if top.is_wide() || below.is_wide() {
                return Err(Error::Internal(String::from("swap of a category 2 value")));
            }
            frame.push_slot(top)?;
            frame.push_slot(below)?;
        }
        _ => {
            return Err(Error::Internal(format!(
                "Not a stack instruction: {}",
                name(op)
            )))
        }
    }
    Ok(Next::Advance(1))
}

/// Copy the top `count` slots, inserting the copy below the `skip` slots under them
fn duplicate(frame: &mut StackFrame<'_>, count: usize, skip: usize) -> Result<(), Error> {
    let len = frame.operand_stack.len();
    if count + skip > len {
        return Err(Error::Internal(format!(
            "Duplicating {} slots past {} in a stack of {}",
            count, skip, len
        )));
    }
    let copied = frame.operand_stack[len - count..].to_vec();
    let insert_at = len - count - skip;

    // Check the capacity first, then splice the copy in place
    for value in &copied {
        frame.push_slot(value.clone())?;
    }
    frame.operand_stack.truncate(len);
    for (offset, value) in copied.into_iter().enumerate() {
        frame.operand_stack.insert(insert_at + offset, value);
    }
    Ok(())
}
