//! Diagnostic renderings of heap state.
//!
//! Both views list only objects reachable from the roots, in address
//! order, and are computed without touching mark bits.

use std::fmt;

use crate::arena::WORD_SIZE;
use crate::heap::Heap;
use crate::object::{ObjectHeader, HEADER_SIZE};
use crate::trace;

/// Textual heap state, as returned by [`Heap::dump_state`].
struct State<'h>(&'h Heap);

impl fmt::Display for State<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.0;
        writeln!(f, "next_free={}", heap.frontier())?;
        writeln!(f, "objects:")?;
        for offset in trace::reachable(&heap.arena, &heap.types, &heap.roots) {
            write_object(f, heap, offset)?;
        }
        Ok(())
    }
}

fn write_object(f: &mut fmt::Formatter<'_>, heap: &Heap, offset: usize) -> fmt::Result {
    let arena = &heap.arena;
    let header = ObjectHeader::read(arena, offset);
    let Some(descriptor) = heap.types.describe(&header) else {
        return Ok(());
    };
    let length = header.length as usize;
    let size = descriptor.instance_size(length).unwrap_or(usize::MAX);

    write!(f, "  {offset:04}:{}", descriptor.name)?;
    if !arena.in_bounds(offset, size) {
        return writeln!(
            f,
            " straddles end of heap; size={size}, heap_size={}",
            arena.size()
        );
    }

    let fixed = descriptor.fixed_size();
    if descriptor.is_variable() {
        write!(f, "[{fixed}+{}]", size - fixed)?;
        if descriptor.is_text() {
            let bytes = arena.bytes(offset + fixed, length);
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            write!(f, "=\"{}\"", String::from_utf8_lossy(&bytes[..end]))?;
        }
    } else {
        write!(f, "[{size}]")?;
    }

    if !descriptor.pointer_offsets.is_empty() {
        write!(f, "->[")?;
        for (i, &field) in descriptor.pointer_offsets.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if field + WORD_SIZE > size || !arena.in_bounds(offset + field, WORD_SIZE) {
                write!(f, "?")?;
                continue;
            }
            match arena.read_word(offset + field) {
                0 => write!(f, "NULL")?,
                addr => match arena.offset_of_addr(addr) {
                    Some(target) => write!(f, "{target}")?,
                    None => write!(f, "{addr:#x}")?,
                },
            }
        }
        write!(f, "]")?;
    }
    writeln!(f)
}

impl Heap {
    /// Text dump of the frontier and every reachable object.
    ///
    /// ```text
    /// next_free=64
    /// objects:
    ///   0000:String[16+6]="parrt"
    ///   0024:User[40]->[0]
    /// ```
    #[must_use]
    pub fn dump_state(&self) -> String {
        State(self).to_string()
    }

    /// One character per arena byte, up to the end of the last reachable
    /// object: `[` starts an object, its type name follows, `_` fills the
    /// rest and `]` marks its last byte. `.` is a byte no reachable object
    /// covers.
    #[must_use]
    pub fn visualize(&self) -> String {
        let live = trace::reachable(&self.arena, &self.types, &self.roots);
        let spans: Vec<(usize, usize, &str)> = live
            .into_iter()
            .filter_map(|offset| {
                let header = ObjectHeader::read(&self.arena, offset);
                let name = self.types.describe(&header)?.name;
                let size = self
                    .types
                    .object_size(&header)
                    .unwrap_or(HEADER_SIZE)
                    .min(self.arena.size() - offset);
                Some((offset, size, name))
            })
            .collect();

        let end = spans.last().map_or(0, |&(offset, size, _)| offset + size);
        let mut map = vec!['.'; end];
        for (offset, size, name) in spans {
            let cells = &mut map[offset..offset + size];
            cells.fill('_');
            cells[0] = '[';
            let inner = size.saturating_sub(2);
            for (cell, ch) in cells[1..].iter_mut().zip(name.chars().take(inner)) {
                *cell = ch;
            }
            cells[size - 1] = ']';
        }
        map.into_iter().collect()
    }
}
