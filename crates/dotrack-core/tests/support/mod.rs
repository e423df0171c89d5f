#![allow(dead_code)]

pub mod gated;
pub mod server;

use std::io::{self, Write};
use std::sync::Arc;

use dotrack_core::render::Renderer;
use parking_lot::Mutex;

/// Shared in-memory sink for renderer output.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn captured_renderer() -> (Renderer, Captured) {
    let captured = Captured::default();
    (Renderer::with_writer(false, Box::new(captured.clone())), captured)
}
