use crate::debugger::frame::parse_address;
use crate::debugger::target::Endianness;
use crate::debugger::{Error, Target, ValueChanged};
use crate::mi::{MiCommand, Value};
use log::debug;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default, PartialEq)]
struct Decoded {
    bytes: Vec<u8>,
    bad: BTreeSet<usize>,
    word_size: usize,
}

/// Turn word samples into bytes. The sample width observed in the reply wins over
/// the requested word size. Unreadable samples (`N/A`) mark all their bytes bad.
fn decode_samples(samples: &[&str], word_size: usize, endianness: Endianness) -> Decoded {
    let observed = samples
        .iter()
        .filter_map(|s| s.strip_prefix("0x"))
        .map(|hex| hex.len() / 2)
        .find(|w| *w > 0);
    let word_size = match observed {
        Some(w) if w != word_size => {
            debug!(target: "debugger", "memory word size {word_size} reported as {w}");
            w
        }
        _ => word_size.max(1),
    };

    let mut decoded = Decoded {
        word_size,
        ..Decoded::default()
    };
    for sample in samples {
        let offset = decoded.bytes.len();
        match parse_address(sample) {
            Some(value) if word_size <= 8 => {
                let word = match endianness {
                    Endianness::Little => value.to_le_bytes()[..word_size].to_vec(),
                    Endianness::Big => value.to_be_bytes()[8 - word_size..].to_vec(),
                };
                decoded.bytes.extend(word);
            }
            _ => {
                decoded.bytes.extend(std::iter::repeat(0).take(word_size));
                decoded.bad.extend(offset..offset + word_size);
            }
        }
    }
    decoded
}

struct BlockContent {
    word_size: usize,
    bytes: Vec<u8>,
    bad: BTreeSet<usize>,
    dirty: bool,
}

/// Cached target memory addressed by an expression.
pub struct MemoryBlock {
    expression: String,
    start: u64,
    length: usize,
    endianness: Endianness,
    frozen: AtomicBool,
    content: Mutex<BlockContent>,
}

impl MemoryBlock {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn word_size(&self) -> usize {
        self.content.lock().unwrap().word_size
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.content.lock().unwrap().bytes.clone()
    }

    /// Offsets of unreadable bytes.
    pub fn bad_offsets(&self) -> BTreeSet<usize> {
        self.content.lock().unwrap().bad.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// Return and clear the dirty flag.
    pub fn take_dirty(&self) -> bool {
        std::mem::take(&mut self.content.lock().unwrap().dirty)
    }

    /// True if the address lies in `[start, start + length]`.
    pub fn covers(&self, address: u64) -> bool {
        self.start <= address && address <= self.start.saturating_add(self.length as u64)
    }

    fn mark_dirty(&self) {
        self.content.lock().unwrap().dirty = true;
    }
}

pub struct MemoryRegistry {
    autoupdate: AtomicBool,
    blocks: Mutex<Vec<Arc<MemoryBlock>>>,
}

impl MemoryRegistry {
    pub(crate) fn new(autoupdate: bool) -> Self {
        Self {
            autoupdate: AtomicBool::new(autoupdate),
            blocks: Mutex::default(),
        }
    }

    pub fn autoupdate(&self) -> bool {
        self.autoupdate.load(Ordering::SeqCst)
    }

    pub fn set_autoupdate(&self, autoupdate: bool) {
        self.autoupdate.store(autoupdate, Ordering::SeqCst)
    }

    fn all(&self) -> Vec<Arc<MemoryBlock>> {
        self.blocks.lock().unwrap().clone()
    }
}

impl Target {
    pub fn memory_autoupdate(&self) -> bool {
        self.memory.autoupdate()
    }

    pub fn set_memory_autoupdate(&self, autoupdate: bool) {
        self.memory.set_autoupdate(autoupdate)
    }

    pub fn memory_blocks(&self) -> Vec<Arc<MemoryBlock>> {
        self.memory.all()
    }

    /// Start caching `length` bytes at the address an expression evaluates to.
    pub fn create_memory_block(
        &self,
        expression: &str,
        word_size: usize,
        length: usize,
    ) -> Result<Arc<MemoryBlock>, Error> {
        self.require(self.configuration().memory_retrieval, "memory retrieval")?;
        self.guard_suspended()?;

        let reply = self.exec(&MiCommand::new("data-evaluate-expression").param(expression))?;
        let value = reply.field("value")?;
        let start = parse_address(value).ok_or_else(|| Error::MalformedReply(value.to_string()))?;

        let block = Arc::new(MemoryBlock {
            expression: expression.to_string(),
            start,
            length,
            endianness: self.endianness()?,
            frozen: AtomicBool::new(false),
            content: Mutex::new(BlockContent {
                word_size: word_size.max(1),
                bytes: vec![],
                bad: BTreeSet::new(),
                dirty: false,
            }),
        });
        self.read_block(&block)?;
        self.memory.blocks.lock().unwrap().push(block.clone());
        Ok(block)
    }

    pub fn destroy_memory_block(&self, block: &MemoryBlock) {
        self.memory
            .blocks
            .lock()
            .unwrap()
            .retain(|b| !std::ptr::eq(b.as_ref(), block));
    }

    /// Frozen blocks are skipped by automatic updates.
    pub fn set_memory_frozen(&self, block: &MemoryBlock, frozen: bool) {
        block.frozen.store(frozen, Ordering::SeqCst);
    }

    /// Read a block again, return addresses whose bytes changed.
    fn read_block(&self, block: &MemoryBlock) -> Result<Vec<u64>, Error> {
        let word_size = block.word_size();
        let words = block.length.div_ceil(word_size).max(1);
        let reply = self.exec(
            &MiCommand::new("data-read-memory")
                .param(format!("{:#x}", block.start))
                .param("x")
                .param(word_size.to_string())
                .param("1")
                .param(words.to_string()),
        )?;

        let samples: Vec<&str> = reply
            .results
            .get_items("memory")
            .into_iter()
            .filter_map(Value::as_tuple)
            .flat_map(|row| row.get_items("data"))
            .filter_map(Value::as_str)
            .collect();
        let mut decoded = decode_samples(&samples, word_size, block.endianness);
        decoded.bytes.truncate(block.length);
        decoded.bad.retain(|offset| *offset < block.length);

        let mut content = block.content.lock().unwrap();
        let changed = if content.bytes.is_empty() {
            vec![]
        } else {
            decoded
                .bytes
                .iter()
                .zip(content.bytes.iter())
                .enumerate()
                .filter(|(_, (new, old))| new != old)
                .map(|(offset, _)| block.start.saturating_add(offset as u64))
                .collect()
        };
        content.word_size = decoded.word_size;
        content.bytes = decoded.bytes;
        content.bad = decoded.bad;
        content.dirty = true;
        Ok(changed)
    }

    /// Refresh a block and every other block covering an address it touched.
    pub fn refresh_memory_block(&self, block: &Arc<MemoryBlock>) -> Result<(), Error> {
        let touched = self.read_block(block)?;
        self.propagate(block, touched)
    }

    fn propagate(&self, origin: &Arc<MemoryBlock>, touched: Vec<u64>) -> Result<(), Error> {
        let mut visited = vec![origin.clone()];
        let mut queue = vec![(origin.clone(), touched)];

        while let Some((block, touched)) = queue.pop() {
            if touched.is_empty() {
                continue;
            }
            self.hooks.on_value_changed(&ValueChanged::Memory {
                start: block.start,
                addresses: touched.clone(),
            });

            for other in self.memory.all() {
                if visited.iter().any(|v| Arc::ptr_eq(v, &other)) {
                    continue;
                }
                if touched.iter().any(|addr| other.covers(*addr)) {
                    other.mark_dirty();
                    let changed = self.read_block(&other)?;
                    visited.push(other.clone());
                    queue.push((other, changed));
                }
            }
        }
        Ok(())
    }

    /// Write bytes at an offset of a block, one byte per command.
    pub fn set_memory(&self, block: &Arc<MemoryBlock>, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        self.require(self.configuration().memory_modification, "memory modification")?;
        self.guard_suspended()?;
        let end = offset.checked_add(bytes.len());
        if offset > block.length || end.map_or(true, |end| end > block.length) {
            return Err(Error::BadOffset {
                offset,
                len: bytes.len(),
                size: block.length,
            });
        }

        for (i, byte) in bytes.iter().enumerate() {
            self.exec(
                &MiCommand::new("data-write-memory")
                    .option("-o")
                    .option((offset + i).to_string())
                    .param(format!("{:#x}", block.start))
                    .param("x")
                    .param("1")
                    .param(format!("{byte:#x}")),
            )?;
        }

        let written: Vec<u64> = (offset..offset + bytes.len())
            .map(|o| block.start.saturating_add(o as u64))
            .collect();
        self.read_block(block)?;
        self.propagate(block, written)?;

        self.cascade_update();
        Ok(())
    }

    /// Refresh all blocks that are not frozen.
    pub fn update_memory(&self) -> Result<(), Error> {
        for block in self.memory.all() {
            if block.is_frozen() {
                continue;
            }
            self.refresh_memory_block(&block)?;
        }
        Ok(())
    }
}
