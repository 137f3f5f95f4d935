//! The fetch-decode-execute loop.
//!
//! One `Vm` owns one exclusive, mutable value stack and must be driven
//! from one thread for the lifetime of one run. The `Executable` it
//! executes is shared read-only. Arithmetic delegates to the shared
//! kernels, so results match what the emitter's constant folder produced
//! bit for bit.

use crate::error::VmFault;
use cobble_bytecode::{
    apply_binary, apply_conv, apply_unary, BinFamily, Executable, FunctionKind, KernelError, Op,
    UnFamily, Value, Width, DATA_BIT,
};
use cobble_interop::{decode_arg, encode_result, HostRegistry};

/// Hard cap on value-stack cells.
pub const STACK_LIMIT: usize = 1 << 20;

/// Sentinel return address of an outermost frame.
const RETURN_SENTINEL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Frame {
    ret_pc: u32,
    /// Stack length at entry — parameters sit below, locals above.
    base: u32,
    /// Function-table index, for parameter-slot teardown on return.
    func: u32,
}

/// A virtual machine executing one compiled program.
pub struct Vm<'a> {
    exe: &'a Executable,
    host: &'a HostRegistry,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    pc: u32,
    halted: bool,
    entry: Option<u32>,
}

impl<'a> Vm<'a> {
    /// Create a machine over an executable and the registry it was
    /// compiled against.
    pub fn new(exe: &'a Executable, host: &'a HostRegistry) -> Self {
        Self {
            exe,
            host,
            stack: Vec::new(),
            frames: Vec::new(),
            pc: 0,
            halted: false,
            entry: None,
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Execution entrypoints
    // ══════════════════════════════════════════════════════════════════════

    /// Reset to an entry function: zero the globals prefix, run the
    /// `(init)` sequence to completion, and arm `entry_name` for
    /// [`Self::run`].
    pub fn reset(&mut self, entry_name: &str) -> Result<(), VmFault> {
        self.stack.clear();
        self.stack
            .resize(self.exe.global_slots as usize, Value::ZERO);
        self.frames.clear();
        self.halted = false;
        self.entry = None;

        self.call_by_index(self.exe.init_function, &[])?;

        let (idx, _) = self
            .exe
            .find_function(entry_name)
            .ok_or_else(|| VmFault::UnknownEntry(entry_name.to_string()))?;
        self.entry = Some(idx);
        Ok(())
    }

    /// Run the armed entry function to completion.
    ///
    /// There is no cancellation primitive inside the loop; a host wishing
    /// to bound execution must impose an external limit around this call.
    pub fn run(&mut self) -> Result<(), VmFault> {
        let idx = self
            .entry
            .ok_or_else(|| VmFault::UnknownEntry("(none armed)".to_string()))?;
        self.call_by_index(idx, &[])?;
        Ok(())
    }

    /// Call a compiled function by name with pre-encoded argument cells.
    /// This is the host-into-VM path.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, VmFault> {
        let (idx, _) = self
            .exe
            .find_function(name)
            .ok_or_else(|| VmFault::UnknownEntry(name.to_string()))?;
        self.call_by_index(idx, args)
    }

    /// The cells of a global variable, if it exists.
    pub fn global_cells(&self, name: &str) -> Option<&[Value]> {
        let var = self.exe.find_global(name)?;
        let start = var.offset as usize;
        let slots = var.ty.slot_count() as usize;
        self.stack.get(start..start + slots)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Call machinery
    // ══════════════════════════════════════════════════════════════════════

    fn call_by_index(&mut self, idx: u32, args: &[Value]) -> Result<Option<Value>, VmFault> {
        let f = self
            .exe
            .functions
            .get(idx as usize)
            .ok_or_else(|| VmFault::MalformedProgram(format!("function index {idx}")))?;
        match f.kind {
            FunctionKind::Bytecode {
                param_slots,
                ret_slots,
                ..
            } => {
                if args.len() as u32 != param_slots {
                    return Err(VmFault::MalformedProgram(format!(
                        "'{}' takes {} argument cells, got {}",
                        f.name,
                        param_slots,
                        args.len()
                    )));
                }
                let depth = self.frames.len();
                let floor = self.stack.len();
                for &a in args {
                    self.push(a)?;
                }
                self.enter(idx)?;
                self.run_frames(depth)?;
                if self.halted {
                    // A Halt stops the run where it stands; tear the
                    // abandoned frames down before handing control back.
                    self.halted = false;
                    self.frames.truncate(depth);
                    self.stack.truncate(floor);
                    return Ok(None);
                }
                if ret_slots == 0 {
                    return Ok(None);
                }
                let cut = self.stack.len() - ret_slots as usize;
                let ret = self.stack.split_off(cut);
                Ok(Some(ret[0]))
            }
            FunctionKind::Host { binding } => {
                for &a in args {
                    self.push(a)?;
                }
                self.call_host(binding)?;
                let ret_void = f.sig.ret.is_void();
                if ret_void {
                    Ok(None)
                } else {
                    Ok(Some(self.pop()?))
                }
            }
            FunctionKind::Declared => Err(VmFault::MissingDefinition(f.name.clone())),
        }
    }

    /// Transfer control into a bytecode function; arguments are already
    /// on the stack in declared order.
    fn enter(&mut self, idx: u32) -> Result<(), VmFault> {
        let f = &self.exe.functions[idx as usize];
        let FunctionKind::Bytecode {
            entry, local_slots, ..
        } = f.kind
        else {
            return match f.kind {
                FunctionKind::Host { binding } => self.call_host(binding),
                _ => Err(VmFault::MissingDefinition(f.name.clone())),
            };
        };
        let base = self.stack.len() as u32;
        self.frames.push(Frame {
            ret_pc: self.pc,
            base,
            func: idx,
        });
        if self.stack.len() + local_slots as usize > STACK_LIMIT {
            return Err(VmFault::StackOverflow);
        }
        self.stack
            .resize(self.stack.len() + local_slots as usize, Value::ZERO);
        self.pc = entry;
        Ok(())
    }

    /// Execute until the frame stack shrinks back to `stop_depth` (return
    /// from the outermost call) or a `Halt` stops the run.
    fn run_frames(&mut self, stop_depth: usize) -> Result<(), VmFault> {
        while self.frames.len() > stop_depth && !self.halted {
            let op = *self
                .exe
                .code
                .get(self.pc as usize)
                .ok_or_else(|| VmFault::MalformedProgram(format!("pc {} out of range", self.pc)))?;
            self.pc += 1;
            self.exec(op)?;
        }
        Ok(())
    }

    /// The uniform trampoline: pop the declared argument cells, decode
    /// each per its parameter type, invoke the binding, push the encoded
    /// result if the return type is not void.
    fn call_host(&mut self, binding: u32) -> Result<(), VmFault> {
        let b = self
            .host
            .get(binding)
            .ok_or_else(|| VmFault::MalformedProgram(format!("host binding {binding}")))?;
        let argc = b.sig.params.len();
        if self.stack.len() < argc {
            return Err(VmFault::MalformedProgram("host call underflow".into()));
        }
        let cells = self.stack.split_off(self.stack.len() - argc);
        let mut args = Vec::with_capacity(argc);
        for (p, &cell) in b.sig.params.iter().zip(cells.iter()) {
            let decoded =
                decode_arg(&p.ty, cell, self.exe).map_err(|e| VmFault::Host(e.to_string()))?;
            args.push(decoded);
        }
        let result = (b.func)(&args).map_err(|e| VmFault::Host(e.to_string()))?;
        if let Some(cell) =
            encode_result(&b.sig.ret, result, self.exe).map_err(|e| VmFault::Host(e.to_string()))?
        {
            self.push(cell)?;
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ══════════════════════════════════════════════════════════════════════

    fn exec(&mut self, op: Op) -> Result<(), VmFault> {
        match op {
            Op::Const(v) => self.push(v)?,
            Op::Dup => {
                let v = self.peek()?;
                self.push(v)?;
            }
            Op::Drop => {
                self.pop()?;
            }

            Op::Add(w) => self.bin(BinFamily::Add, w)?,
            Op::Sub(w) => self.bin(BinFamily::Sub, w)?,
            Op::Mul(w) => self.bin(BinFamily::Mul, w)?,
            Op::Div(w) => self.bin(BinFamily::Div, w)?,
            Op::Rem(w) => self.bin(BinFamily::Rem, w)?,
            Op::BitAnd(w) => self.bin(BinFamily::BitAnd, w)?,
            Op::BitOr(w) => self.bin(BinFamily::BitOr, w)?,
            Op::BitXor(w) => self.bin(BinFamily::BitXor, w)?,
            Op::Shl(w) => self.bin(BinFamily::Shl, w)?,
            Op::Shr(w) => self.bin(BinFamily::Shr, w)?,
            Op::Eq(w) => self.bin(BinFamily::Eq, w)?,
            Op::Gt(w) => self.bin(BinFamily::Gt, w)?,
            Op::Ge(w) => self.bin(BinFamily::Ge, w)?,
            Op::Neg(w) => self.un(UnFamily::Neg, w)?,
            Op::BitNot(w) => self.un(UnFamily::BitNot, w)?,

            Op::Not => {
                let v = self.pop()?;
                self.push(Value::from_bool(!v.is_truthy()))?;
            }
            Op::BoolAnd => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::from_bool(a.is_truthy() && b.is_truthy()))?;
            }
            Op::BoolOr => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::from_bool(a.is_truthy() || b.is_truthy()))?;
            }

            Op::Conv { from, to } => {
                let v = self.pop()?;
                self.push(apply_conv(from, to, v))?;
            }

            Op::Jump(t) => self.pc = t,
            Op::BranchZero(t) => {
                if !self.pop()?.is_truthy() {
                    self.pc = t;
                }
            }
            Op::BranchNonZero(t) => {
                if self.pop()?.is_truthy() {
                    self.pc = t;
                }
            }
            Op::BranchZeroPeek(t) => {
                if !self.peek()?.is_truthy() {
                    self.pc = t;
                }
            }
            Op::BranchNonZeroPeek(t) => {
                if self.peek()?.is_truthy() {
                    self.pc = t;
                }
            }

            Op::LoadGlobal(g) => {
                let v = *self
                    .stack
                    .get(g as usize)
                    .ok_or(VmFault::InvalidAddress(g as u64))?;
                self.push(v)?;
            }
            Op::StoreGlobal(g) => {
                let v = self.pop()?;
                let cell = self
                    .stack
                    .get_mut(g as usize)
                    .ok_or(VmFault::InvalidAddress(g as u64))?;
                *cell = v;
            }
            Op::LoadFrame(off) => {
                let idx = self.frame_index(off)?;
                let v = *self
                    .stack
                    .get(idx)
                    .ok_or(VmFault::InvalidAddress(idx as u64))?;
                self.push(v)?;
            }
            Op::StoreFrame(off) => {
                let v = self.pop()?;
                let idx = self.frame_index(off)?;
                let cell = self
                    .stack
                    .get_mut(idx)
                    .ok_or(VmFault::InvalidAddress(idx as u64))?;
                *cell = v;
            }
            Op::GlobalAddr(g) => self.push(Value::from_addr(g as u64))?,
            Op::FrameAddr(off) => {
                let idx = self.frame_index(off)?;
                self.push(Value::from_addr(idx as u64))?;
            }

            Op::LoadInd(w) => {
                let addr = self.pop()?.as_addr();
                let v = self.load_address(addr, w)?;
                self.push(v)?;
            }
            Op::StoreInd(_) => {
                let v = self.pop()?;
                let addr = self.pop()?.as_addr();
                if addr & DATA_BIT != 0 {
                    return Err(VmFault::InvalidAddress(addr)); // data is read-only
                }
                let cell = self
                    .stack
                    .get_mut(addr as usize)
                    .ok_or(VmFault::InvalidAddress(addr))?;
                *cell = v;
            }
            Op::PtrAdd(scale) => {
                let off = self.pop()?.as_i64();
                let addr = self.pop()?.as_addr();
                let moved = addr.wrapping_add((off * scale as i64) as u64);
                self.push(Value::from_addr(moved))?;
            }
            Op::CopySlots(n) => {
                let addr = self.pop()?.as_addr();
                if addr & DATA_BIT != 0 {
                    return Err(VmFault::InvalidAddress(addr));
                }
                for i in 0..n as u64 {
                    let v = *self
                        .stack
                        .get((addr + i) as usize)
                        .ok_or(VmFault::InvalidAddress(addr + i))?;
                    self.push(v)?;
                }
            }

            Op::Call(f) => self.enter(f)?,
            Op::CallHost(b) => self.call_host(b)?,
            Op::Return { value_slots } => self.exec_return(value_slots)?,
            Op::Halt => self.halted = true,
        }
        Ok(())
    }

    fn exec_return(&mut self, value_slots: u32) -> Result<(), VmFault> {
        let n = value_slots as usize;
        if self.stack.len() < n {
            return Err(VmFault::MalformedProgram("return underflow".into()));
        }
        let ret = self.stack.split_off(self.stack.len() - n);
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| VmFault::MalformedProgram("return without frame".into()))?;
        let param_slots = match self.exe.functions[frame.func as usize].kind {
            FunctionKind::Bytecode { param_slots, .. } => param_slots,
            _ => 0,
        };
        self.stack
            .truncate((frame.base - param_slots) as usize);
        for v in ret {
            self.push(v)?;
        }
        self.pc = frame.ret_pc;
        Ok(())
    }

    // ── Stack primitives ─────────────────────────────────────────────────

    fn push(&mut self, v: Value) -> Result<(), VmFault> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(VmFault::StackOverflow);
        }
        self.stack.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, VmFault> {
        self.stack
            .pop()
            .ok_or_else(|| VmFault::MalformedProgram("operand stack underflow".into()))
    }

    fn peek(&self) -> Result<Value, VmFault> {
        self.stack
            .last()
            .copied()
            .ok_or_else(|| VmFault::MalformedProgram("operand stack underflow".into()))
    }

    fn frame_index(&self, off: i32) -> Result<usize, VmFault> {
        let base = self
            .frames
            .last()
            .map(|f| f.base as i64)
            .unwrap_or(self.exe.global_slots as i64);
        let idx = base + off as i64;
        if idx < 0 {
            return Err(VmFault::InvalidAddress(idx as u64));
        }
        Ok(idx as usize)
    }

    fn bin(&mut self, family: BinFamily, w: Width) -> Result<(), VmFault> {
        let b = self.pop()?;
        let a = self.pop()?;
        let r = apply_binary(family, w, a, b).map_err(kernel_fault)?;
        self.push(r)
    }

    fn un(&mut self, family: UnFamily, w: Width) -> Result<(), VmFault> {
        let v = self.pop()?;
        let r = apply_unary(family, w, v).map_err(kernel_fault)?;
        self.push(r)
    }

    /// Dereference a pointer cell: stack addresses read whole cells, data
    /// addresses read little-endian bytes of the requested width from the
    /// read-only string area.
    fn load_address(&self, addr: u64, w: Width) -> Result<Value, VmFault> {
        if addr & DATA_BIT == 0 {
            return self
                .stack
                .get(addr as usize)
                .copied()
                .ok_or(VmFault::InvalidAddress(addr));
        }
        let start = (addr & !DATA_BIT) as usize;
        let bytes = byte_width(w);
        let slice = self
            .exe
            .strings
            .get(start..start + bytes)
            .ok_or(VmFault::InvalidAddress(addr))?;
        let mut raw = [0u8; 8];
        raw[..bytes].copy_from_slice(slice);
        let unsigned = match bytes {
            1 => Width::U8,
            2 => Width::U16,
            4 => Width::U32,
            _ => Width::U64,
        };
        Ok(apply_conv(unsigned, w, Value::from_u64(u64::from_le_bytes(raw))))
    }
}

fn kernel_fault(e: KernelError) -> VmFault {
    match e {
        KernelError::ZeroDivide => VmFault::ZeroDivide,
        KernelError::Unsupported => {
            VmFault::MalformedProgram("operation not defined at this width".into())
        }
    }
}

fn byte_width(w: Width) -> usize {
    match w {
        Width::I8 | Width::U8 => 1,
        Width::I16 | Width::U16 => 2,
        Width::I32 | Width::U32 | Width::F32 => 4,
        Width::I64 | Width::U64 | Width::F64 => 8,
    }
}
