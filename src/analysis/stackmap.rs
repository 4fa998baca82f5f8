//! `StackMapTable` encoding.
//!
//! Class files of version 50 and later carry a stack map frame at every branch target and
//! exception handler. The encoder takes the frames computed by the
//! [`crate::analysis::VerifierInterpreter`] and writes them with the most compact frame type
//! available (`same`, `same_locals_1_stack_item`, `chop`, `append` or `full`).

use std::collections::BTreeMap;

use crate::{
    analysis::{
        analyzer::Analysis,
        frame::Frame,
        interpreter::{AbstractValue, VerificationType},
    },
    classfile::{
        constpool::ConstantPoolBuilder,
        insn::{Insn, LabelId},
        nodes::Code,
    },
    file::io::push_be,
    Error, Result,
};

/// Encode the `StackMapTable` body of `code`, or `None` if no frame is needed.
///
/// `offsets` holds the bytecode offset of every node of the instruction list.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if a frame point is unreachable, and
/// [`crate::Error::Malformed`] for dangling labels.
pub fn encode_stack_map_table(
    code: &Code,
    analysis: &Analysis<VerificationType>,
    offsets: &[u32],
    pool: &mut ConstantPoolBuilder,
) -> Result<Option<Vec<u8>>> {
    let insns = code.instructions.as_slice();
    let mut targets: Vec<LabelId> = insns.iter().flat_map(Insn::targets).collect();
    targets.extend(code.try_catch_blocks.iter().map(|block| block.handler));

    let mut points: BTreeMap<u32, usize> = BTreeMap::new();
    for label in targets {
        let Some(index) = code.instructions.label_index(label) else {
            return Err(malformed_error!("Undefined label L{}", label.0));
        };
        points.entry(offsets[index]).or_insert(index);
    }

    if points.is_empty() {
        return Ok(None);
    }

    let Some(Some(initial)) = analysis.frames.first() else {
        return Err(malformed_error!("Missing initial frame"));
    };

    let mut body = Vec::new();
    push_be(&mut body, points.len() as u16);

    let mut previous_locals = compress_locals(initial);
    let mut previous_offset: Option<u32> = None;
    for (offset, index) in points {
        let Some(frame) = analysis.frames.get(index).and_then(Option::as_ref) else {
            return Err(Error::NotSupported(format!(
                "unreachable branch target at offset {offset}"
            )));
        };

        let delta = match previous_offset {
            None => offset,
            Some(previous) => offset - previous - 1,
        };
        let delta = u16::try_from(delta)
            .map_err(|_| Error::NotSupported("method body exceeds 65535 bytes".to_string()))?;

        let locals = compress_locals(frame);
        let stack = frame.stack();
        write_frame(&mut body, delta, &previous_locals, &locals, stack, offsets, pool)?;

        previous_locals = locals;
        previous_offset = Some(offset);
    }

    Ok(Some(body))
}

/// Local slots as written to a frame: one entry per category-2 value and no trailing `Top`.
fn compress_locals(frame: &Frame<VerificationType>) -> Vec<VerificationType> {
    let mut locals = Vec::new();
    let mut slots = frame.locals().iter();
    while let Some(value) = slots.next() {
        if value.size() == 2 {
            slots.next();
        }
        locals.push(value.clone());
    }
    while locals.last() == Some(&VerificationType::Top) {
        locals.pop();
    }
    locals
}

fn write_frame(
    out: &mut Vec<u8>,
    delta: u16,
    previous: &[VerificationType],
    locals: &[VerificationType],
    stack: &[VerificationType],
    offsets: &[u32],
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    let same_locals = previous == locals;

    if same_locals && stack.is_empty() {
        if delta < 64 {
            push_be(out, delta as u8);
        } else {
            push_be(out, 251_u8);
            push_be(out, delta);
        }
        return Ok(());
    }

    if same_locals && stack.len() == 1 {
        if delta < 64 {
            push_be(out, 64 + delta as u8);
        } else {
            push_be(out, 247_u8);
            push_be(out, delta);
        }
        return write_type(out, &stack[0], offsets, pool);
    }

    if stack.is_empty() {
        if locals.len() < previous.len()
            && previous.len() - locals.len() <= 3
            && previous.starts_with(locals)
        {
            push_be(out, (251 - (previous.len() - locals.len())) as u8);
            push_be(out, delta);
            return Ok(());
        }
        if locals.len() > previous.len()
            && locals.len() - previous.len() <= 3
            && locals.starts_with(previous)
        {
            push_be(out, (251 + (locals.len() - previous.len())) as u8);
            push_be(out, delta);
            for value in &locals[previous.len()..] {
                write_type(out, value, offsets, pool)?;
            }
            return Ok(());
        }
    }

    push_be(out, 255_u8);
    push_be(out, delta);
    push_be(out, locals.len() as u16);
    for value in locals {
        write_type(out, value, offsets, pool)?;
    }
    push_be(out, stack.len() as u16);
    for value in stack {
        write_type(out, value, offsets, pool)?;
    }
    Ok(())
}

fn write_type(
    out: &mut Vec<u8>,
    value: &VerificationType,
    offsets: &[u32],
    pool: &mut ConstantPoolBuilder,
) -> Result<()> {
    match value {
        VerificationType::Top => push_be(out, 0_u8),
        VerificationType::Integer => push_be(out, 1_u8),
        VerificationType::Float => push_be(out, 2_u8),
        VerificationType::Double => push_be(out, 3_u8),
        VerificationType::Long => push_be(out, 4_u8),
        VerificationType::Null => push_be(out, 5_u8),
        VerificationType::UninitializedThis(_) => push_be(out, 6_u8),
        VerificationType::Reference(name) => {
            push_be(out, 7_u8);
            push_be(out, pool.class(name)?);
        }
        VerificationType::Uninitialized { index, .. } => {
            let Some(offset) = offsets.get(*index) else {
                return Err(malformed_error!("Uninitialized value without a new instruction"));
            };
            push_be(out, 8_u8);
            push_be(out, *offset as u16);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::interpreter::{Interpreter, VerifierInterpreter};
    use crate::analysis::ObjectHierarchy;

    fn frame(locals: Vec<VerificationType>) -> Frame<VerificationType> {
        let interp = VerifierInterpreter::new(&ObjectHierarchy);
        let mut frame = Frame::new(locals.len(), interp.new_empty());
        for (i, value) in locals.into_iter().enumerate() {
            frame.set_local(i, value).unwrap();
        }
        frame
    }

    #[test]
    fn test_compress_locals() {
        let frame = frame(vec![
            VerificationType::Long,
            VerificationType::Top,
            VerificationType::Integer,
            VerificationType::Top,
            VerificationType::Top,
        ]);
        assert_eq!(
            compress_locals(&frame),
            vec![VerificationType::Long, VerificationType::Integer]
        );
    }

    #[test]
    fn test_frame_kinds() {
        let mut pool = ConstantPoolBuilder::from_pool(&Default::default());
        let int = [VerificationType::Integer];
        let two = [VerificationType::Integer, VerificationType::Float];

        let mut out = Vec::new();
        write_frame(&mut out, 3, &int, &int, &[], &[], &mut pool).unwrap();
        assert_eq!(out, vec![3]);

        let mut out = Vec::new();
        write_frame(&mut out, 3, &int, &int, &int, &[], &mut pool).unwrap();
        assert_eq!(out, vec![67, 1]);

        let mut out = Vec::new();
        write_frame(&mut out, 3, &int, &two, &[], &[], &mut pool).unwrap();
        assert_eq!(out, vec![252, 0, 3, 2]);

        let mut out = Vec::new();
        write_frame(&mut out, 3, &two, &int, &[], &[], &mut pool).unwrap();
        assert_eq!(out, vec![250, 0, 3]);

        let mut out = Vec::new();
        write_frame(&mut out, 100, &int, &int, &[], &[], &mut pool).unwrap();
        assert_eq!(out, vec![251, 0, 100]);
    }
}
