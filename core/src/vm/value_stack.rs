//! Shared byte arena holding every in-flight string value and call-argument
//! vector.
//!
//! `start`/`len` describe the current value. `advance` saves `start` and
//! opens a new value directly after the current one; `rewind` returns to
//! the saved start and re-measures up to the next NUL, which concatenates
//! the two values. `push_frame` marks where a call's arguments begin and
//! reserves headroom for the callee's return value; `get_argc_argv` slices
//! the pushed values back out and closes the frame.
//!
//! Advances and rewinds must nest strictly inside their enclosing
//! `push_frame`/`get_argc_argv` pair. The compiler guarantees it; the
//! stack only checks it in debug builds.

use tracing::error;

use crate::{intern::Symbol, val};

/// Bytes reserved in front of a call's arguments for the value it returns.
pub const RETURN_BUFFER_SPACE: usize = 512;

const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct ValueStack {
    buffer: Vec<u8>,
    start: usize,
    len: usize,
    start_offsets: Vec<usize>,
    frame_offsets: Vec<usize>,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStack {
    pub fn new() -> Self {
        Self {
            buffer: vec![0; INITIAL_CAPACITY],
            start: 0,
            len: 0,
            start_offsets: Vec::new(),
            frame_offsets: Vec::new(),
        }
    }

    #[inline]
    fn reserve_to(&mut self, size: usize) {
        if self.buffer.len() < size {
            let grown = (size + INITIAL_CAPACITY).next_power_of_two();
            self.buffer.resize(grown, 0);
        }
    }

    fn strlen_from(&self, at: usize) -> usize {
        self.buffer[at..].iter().position(|&b| b == 0).unwrap_or(self.buffer.len() - at)
    }

    /// Nested value depth; each `advance`/`push` adds one.
    pub fn depth(&self) -> usize {
        self.start_offsets.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frame_offsets.len()
    }

    #[inline]
    pub fn get_str(&self) -> &str {
        std::str::from_utf8(&self.buffer[self.start..self.start + self.len]).unwrap_or("")
    }

    pub fn get_int(&self) -> i32 {
        val::parse_int(self.get_str())
    }

    pub fn get_float(&self) -> f64 {
        val::parse_float(self.get_str())
    }

    pub fn set_str(&mut self, s: &str) {
        self.reserve_to(self.start + s.len() + 1);
        self.buffer[self.start..self.start + s.len()].copy_from_slice(s.as_bytes());
        self.len = s.len();
        self.buffer[self.start + self.len] = 0;
    }

    pub fn set_int(&mut self, value: i32) {
        let mut buf = itoa::Buffer::new();
        let text = buf.format(value);
        self.set_str(text);
    }

    pub fn set_float(&mut self, value: f64) {
        let text = val::format_float(value);
        self.set_str(&text);
    }

    pub fn set_symbol(&mut self, sym: Symbol) {
        self.set_str(sym.as_str());
    }

    /// Open a new value right after the current one.
    pub fn advance(&mut self) {
        self.start_offsets.push(self.start);
        self.start += self.len;
        self.len = 0;
        self.reserve_to(self.start + 1);
        self.buffer[self.start] = 0;
    }

    /// Append `c` to the current value, then advance.
    pub fn advance_char(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        let encoded = c.encode_utf8(&mut utf8).as_bytes();
        self.reserve_to(self.start + self.len + encoded.len() + 1);
        let at = self.start + self.len;
        self.buffer[at..at + encoded.len()].copy_from_slice(encoded);
        self.len += encoded.len();
        self.advance();
    }

    /// Terminate the current value and advance past the terminator.
    pub fn push(&mut self) {
        self.reserve_to(self.start + self.len + 2);
        self.buffer[self.start + self.len] = 0;
        self.len += 1;
        self.advance();
    }

    /// Return to the saved value, joined with everything written since.
    pub fn rewind(&mut self) {
        let Some(start) = self.pop_start() else { return };
        self.start = start;
        self.len = self.strlen_from(start);
    }

    /// Drop the current value and return to the saved one.
    pub fn rewind_terminate(&mut self) {
        self.buffer[self.start] = 0;
        let Some(start) = self.pop_start() else { return };
        self.start = start;
        self.len = self.strlen_from(start);
    }

    /// Case-insensitively compare the saved value with the current one,
    /// leaving an empty current value at the saved position.
    pub fn compare(&mut self) -> bool {
        let current = self.start;
        let current_len = self.len;
        let Some(start) = self.pop_start() else { return false };
        let saved_len = self.strlen_from(start);
        let equal = self.buffer[start..start + saved_len]
            .eq_ignore_ascii_case(&self.buffer[current..current + current_len]);
        self.start = start;
        self.len = 0;
        self.buffer[start] = 0;
        equal
    }

    fn pop_start(&mut self) -> Option<usize> {
        let floor = self.frame_offsets.last().map_or(0, |f| f + 1);
        if self.start_offsets.len() <= floor {
            error!("value stack underflow: rewind below the enclosing frame");
            debug_assert!(false, "value stack underflow");
            return None;
        }
        self.start_offsets.pop()
    }

    pub fn push_frame(&mut self) {
        self.frame_offsets.push(self.start_offsets.len());
        self.start_offsets.push(self.start);
        self.start += RETURN_BUFFER_SPACE;
        self.len = 0;
        self.reserve_to(self.start + 1);
        self.buffer[self.start] = 0;
    }

    /// Discard the innermost call frame without collecting its arguments.
    pub fn pop_frame(&mut self) {
        let Some(base) = self.frame_offsets.pop() else {
            error!("value stack underflow: no call frame to pop");
            return;
        };
        self.start = self.start_offsets[base];
        self.start_offsets.truncate(base);
        self.len = 0;
    }

    /// Collect the values pushed since the innermost `push_frame` as an
    /// argument vector with `name` prepended, and close the frame. The
    /// current value becomes empty at the frame's original position.
    pub fn get_argc_argv(&mut self, name: Symbol) -> Vec<String> {
        let Some(base) = self.frame_offsets.pop() else {
            error!("value stack underflow: no call frame for {name}");
            return vec![name.as_str().to_owned()];
        };
        let first = base + 1;
        let mut argv = Vec::with_capacity(self.start_offsets.len().saturating_sub(first) + 1);
        argv.push(name.as_str().to_owned());
        for &at in &self.start_offsets[first.min(self.start_offsets.len())..] {
            let end = at + self.strlen_from(at);
            argv.push(String::from_utf8_lossy(&self.buffer[at..end]).into_owned());
        }
        self.start = self.start_offsets[base];
        self.start_offsets.truncate(base);
        self.len = 0;
        argv
    }

    /// Reset to the state of a fresh stack, keeping the allocation.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
        self.start_offsets.clear();
        self.frame_offsets.clear();
        self.buffer[0] = 0;
    }
}
