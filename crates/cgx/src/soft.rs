//! A software GPU: runs the command stream on a host thread.
//!
//! The pipe gathers stores into 32 byte bursts exactly like the write-gather hardware and hands
//! them to the GPU thread, which decodes them, keeps the register state and raises the PE finish
//! interrupt when asked to. Interrupt handlers run on the GPU thread.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};
use rustc_hash::FxHashMap;
use tracing::{debug, error, trace};

use crate::Address;
use crate::Primitive;
use crate::boot::{Backend, FifoBuffer};
use crate::decode::{Command, DecodeError, Decoder};
use crate::hw::{DataCache, Handler, Interrupt, PixelEngine};
use crate::pipe::{BURST_LEN, Pipe};
use crate::reg::pix::InterruptStatus;
use crate::reg::{bp, cp};
use crate::stream::BinRingBuffer;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register state as seen by the GPU, after executing everything it received.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    pub bp: FxHashMap<bp::Reg, u32>,
    pub cp: FxHashMap<cp::Reg, u32>,
    pub xf: FxHashMap<u16, u32>,
    /// How many draws were executed.
    pub draws: u64,
    /// How many draw-done requests were executed.
    pub done: u64,
    /// Every executed command except no-ops, in order.
    pub commands: Vec<Command>,
    /// The error that stopped the GPU, if any.
    pub fault: Option<DecodeError>,
}

impl Registers {
    pub fn bp(&self, reg: bp::Reg) -> Option<u32> {
        self.bp.get(&reg).copied()
    }

    pub fn cp(&self, reg: cp::Reg) -> Option<u32> {
        self.cp.get(&reg).copied()
    }

    pub fn xf(&self, address: u16) -> Option<u32> {
        self.xf.get(&address).copied()
    }

    pub fn xf_f32(&self, address: u16) -> Option<f32> {
        self.xf(address).map(f32::from_bits)
    }
}

struct Shared {
    registers: Mutex<Registers>,
    pe: Mutex<InterruptStatus>,
    handlers: Mutex<FxHashMap<Interrupt, Handler>>,
}

impl Shared {
    fn execute(&self, command: Command) {
        trace!(?command, "executing");

        let mut finished = false;
        let mut regs = lock(&self.registers);
        match &command {
            Command::Nop => return,
            Command::SetBP { register, value } => {
                regs.bp.insert(*register, *value);
                if *register == bp::Reg::PixelDone && value & bp::DRAW_DONE != 0 {
                    regs.done += 1;
                    finished = true;
                }
            }
            Command::SetCP { register, value } => {
                regs.cp.insert(*register, *value);
            }
            Command::SetXF { start, values } => {
                for (offset, value) in values.iter().enumerate() {
                    regs.xf.insert(start.wrapping_add(offset as u16), *value);
                }
            }
            Command::Draw { .. } => regs.draws += 1,
            _ => (),
        }
        regs.commands.push(command);
        drop(regs);

        if finished {
            self.raise_finish();
        }
    }

    fn raise_finish(&self) {
        let enabled = {
            let mut pe = lock(&self.pe);
            pe.set_finish(true);
            pe.finish_enabled()
        };

        if !enabled {
            return;
        }

        let mut handlers = lock(&self.handlers);
        if let Some(handler) = handlers.get_mut(&Interrupt::PeFinish) {
            debug!("raising PE finish interrupt");
            handler();
        }
    }
}

enum Message {
    Burst([u8; BURST_LEN]),
    Sync(Sender<()>),
}

fn worker(shared: Arc<Shared>, receiver: Receiver<Message>) {
    let mut queue = BinRingBuffer::default();
    let mut decoder = Decoder::new();
    let mut faulted = false;

    while let Ok(message) = receiver.recv() {
        match message {
            Message::Burst(burst) => {
                if faulted {
                    continue;
                }

                queue.extend_from_slice(&burst);
                loop {
                    match decoder.read(&mut queue) {
                        Ok(Some(command)) => shared.execute(command),
                        Ok(None) => break,
                        Err(e) => {
                            error!("GPU stopped: {e}");
                            lock(&shared.registers).fault = Some(e);
                            faulted = true;
                            break;
                        }
                    }
                }
            }
            Message::Sync(done) => {
                _ = done.send(());
            }
        }
    }
}

/// The host write-gather pipe.
pub struct SoftPipe {
    queue: [u8; BURST_LEN + 4],
    index: usize,
    sender: Sender<Message>,
}

impl SoftPipe {
    fn gather<P: Primitive>(&mut self, value: P) {
        value.write_be_bytes(&mut self.queue[self.index..][..size_of::<P>()]);
        self.index += size_of::<P>();

        if self.index < BURST_LEN {
            return;
        }

        let mut burst = [0; BURST_LEN];
        burst.copy_from_slice(&self.queue[..BURST_LEN]);
        self.sender
            .send(Message::Burst(burst))
            .expect("software GPU thread is alive");

        self.queue.copy_within(BURST_LEN..self.index, 0);
        self.index -= BURST_LEN;
    }

    /// Bytes stored but not yet forwarded.
    pub fn pending(&self) -> usize {
        self.index
    }
}

impl Pipe for SoftPipe {
    fn write_u8(&mut self, value: u8) {
        self.gather(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.gather(value);
    }

    fn write_u32(&mut self, value: u32) {
        self.gather(value);
    }
}

/// The PE registers of the software GPU.
pub struct SoftPixelEngine {
    shared: Arc<Shared>,
}

impl PixelEngine for SoftPixelEngine {
    fn read_interrupt(&self) -> InterruptStatus {
        *lock(&self.shared.pe)
    }

    fn write_interrupt(&mut self, value: InterruptStatus) {
        lock(&self.shared.pe).write(value);
    }
}

/// A data cache that records flush requests.
#[derive(Debug, Clone, Default)]
pub struct RecordingCache {
    flushes: Arc<Mutex<Vec<(Address, u32)>>>,
}

impl RecordingCache {
    pub fn flushes(&self) -> Vec<(Address, u32)> {
        lock(&self.flushes).clone()
    }
}

impl DataCache for RecordingCache {
    fn flush_range(&mut self, address: Address, len: u32) {
        trace!("flushing {len} bytes at {address}");
        lock(&self.flushes).push((address, len));
    }
}

/// A GPU running on a host thread.
pub struct SoftGpu {
    shared: Arc<Shared>,
    sender: Sender<Message>,
    cache: RecordingCache,
}

impl SoftGpu {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            registers: Mutex::new(Registers::default()),
            pe: Mutex::new(InterruptStatus::default()),
            handlers: Mutex::new(FxHashMap::default()),
        });

        let (sender, receiver) = flume::unbounded();
        std::thread::Builder::new()
            .name("cgx software gpu".into())
            .spawn({
                let shared = shared.clone();
                move || worker(shared, receiver)
            })
            .expect("spawning the software GPU thread");

        Self {
            shared,
            sender,
            cache: RecordingCache::default(),
        }
    }

    /// Blocks until the GPU thread has executed every burst forwarded so far.
    pub fn sync(&self) {
        let (sender, receiver) = flume::bounded(1);
        self.sender
            .send(Message::Sync(sender))
            .expect("software GPU thread is alive");
        _ = receiver.recv();
    }

    /// A snapshot of the register state after executing every burst forwarded so far.
    pub fn registers(&self) -> Registers {
        self.sync();
        lock(&self.shared.registers).clone()
    }

    pub fn interrupt_status(&self) -> InterruptStatus {
        *lock(&self.shared.pe)
    }

    /// Every cache flush requested so far, in order.
    pub fn flushes(&self) -> Vec<(Address, u32)> {
        self.cache.flushes()
    }
}

impl Default for SoftGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for SoftGpu {
    type Pipe = SoftPipe;
    type Cache = RecordingCache;
    type PixelEngine = SoftPixelEngine;

    fn init_fifo(&mut self, fifo: &mut FifoBuffer) -> SoftPipe {
        debug!("software GPU reading from FIFO at {}", fifo.address());
        SoftPipe {
            queue: [0; BURST_LEN + 4],
            index: 0,
            sender: self.sender.clone(),
        }
    }

    fn cache(&mut self) -> RecordingCache {
        self.cache.clone()
    }

    fn pixel_engine(&mut self) -> SoftPixelEngine {
        SoftPixelEngine {
            shared: self.shared.clone(),
        }
    }

    fn request_interrupt(&mut self, interrupt: Interrupt, handler: Handler) {
        debug!("registered handler for {interrupt:?}");
        lock(&self.shared.handlers).insert(interrupt, handler);
    }
}
