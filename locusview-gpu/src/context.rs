//! Backend ownership, CPU mirroring and context-loss bookkeeping shared by
//! both renderers.

use crate::frame::FrameParams;
use crate::{ContextEvent, ContextState, RenderBackend};
use locusview_core::{Attribute, EngineError, EngineResult, InstanceBufferSet};

type EventListener = Box<dyn FnMut(ContextEvent)>;

/// Owns a [`RenderBackend`] together with the last uploaded instance data and
/// frame parameters, so everything can be resubmitted after a resize or a
/// lost context.
pub struct BackendContext<B: RenderBackend> {
    backend: B,
    mirror: Option<InstanceBufferSet>,
    frame: Option<FrameParams>,
    size: (u32, u32),
    listeners: Vec<EventListener>,
    lost_reported: bool,
}

impl<B: RenderBackend> BackendContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            mirror: None,
            frame: None,
            size: (0, 0),
            listeners: Vec::new(),
            lost_reported: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn instances(&self) -> Option<&InstanceBufferSet> {
        self.mirror.as_ref()
    }

    pub fn instance_count(&self) -> usize {
        self.mirror.as_ref().map_or(0, InstanceBufferSet::len)
    }

    pub fn frame(&self) -> Option<&FrameParams> {
        self.frame.as_ref()
    }

    pub fn set_frame(&mut self, frame: FrameParams) {
        self.frame = Some(frame);
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn on_event(&mut self, listener: impl FnMut(ContextEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: ContextEvent) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }

    /// `Err(ContextLost)` while the backend is lost. The host is notified once
    /// per loss.
    pub fn check_alive(&mut self) -> EngineResult<()> {
        if self.backend.state() == ContextState::Ready {
            return Ok(());
        }
        if !self.lost_reported {
            log::warn!("{} context lost; waiting for restore", self.backend.name());
            self.lost_reported = true;
            self.emit(ContextEvent::Lost);
        }
        Err(EngineError::ContextLost)
    }

    /// Route backend failures through the loss bookkeeping.
    fn guard<T>(&mut self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(EngineError::ContextLost) = result {
            self.check_alive()?;
        }
        result
    }

    /// Fully reinitialise the backend when the target size changes, then
    /// resubmit the mirrored instances. Returns whether a rebuild happened.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> EngineResult<bool> {
        if self.size == (width, height) && self.backend.size() == (width, height) {
            return Ok(false);
        }
        self.check_alive()?;
        let result = self.backend.initialize(width, height);
        self.guard(result)?;
        self.size = (width, height);
        log::debug!(
            "{} backend reinitialized at {}x{}",
            self.backend.name(),
            width,
            height
        );
        self.upload_mirror()?;
        Ok(true)
    }

    /// Validate and upload a full dataset, replacing every attribute buffer.
    pub fn upload(&mut self, set: InstanceBufferSet) -> EngineResult<()> {
        set.validate()?;
        self.mirror = Some(set);
        if self.size == (0, 0) {
            log::debug!("Deferring instance upload until the viewport is known");
            return Ok(());
        }
        self.check_alive()?;
        self.upload_mirror()
    }

    fn upload_mirror(&mut self) -> EngineResult<()> {
        let Some(set) = self.mirror.as_ref() else {
            return Ok(());
        };
        let mut result = Ok(());
        for attribute in Attribute::ALL {
            result = self.backend.reallocate(attribute, set.bytes(attribute));
            if result.is_err() {
                break;
            }
        }
        if result.is_ok() {
            log::debug!("Uploaded {} instances", set.len());
        }
        self.guard(result)
    }

    /// Set or clear one highlight flag with a 4-byte partial write. Returns
    /// `false` when `index` is out of range.
    pub fn write_highlight(&mut self, index: usize, on: bool) -> EngineResult<bool> {
        let sized = self.size != (0, 0);
        if sized {
            self.check_alive()?;
        }
        let Some(set) = self.mirror.as_mut() else {
            return Ok(false);
        };
        if !set.set_highlight_flag(index, on) {
            return Ok(false);
        }
        if !sized {
            return Ok(true);
        }
        let flag = on as u32;
        let result = self.backend.write(
            Attribute::Highlight,
            InstanceBufferSet::byte_offset(index),
            bytemuck::bytes_of(&flag),
        );
        self.guard(result)?;
        Ok(true)
    }

    /// Rebuild every resource after a loss and resubmit the cached data and
    /// viewport.
    pub fn restore(&mut self) -> EngineResult<()> {
        let (width, height) = self.size;
        if width == 0 || height == 0 {
            return Err(EngineError::resource_init(
                "cannot restore a context that was never sized",
            ));
        }
        self.backend.initialize(width, height)?;
        self.upload_mirror()?;
        self.lost_reported = false;
        log::info!("{} context restored", self.backend.name());
        self.emit(ContextEvent::Restored);
        Ok(())
    }

    /// Run a draw against the cached frame. Without a frame this is a no-op.
    pub fn draw(&mut self, pass: impl FnOnce(&mut B, &FrameParams) -> EngineResult<()>) -> EngineResult<()> {
        self.check_alive()?;
        let Some(frame) = self.frame.as_ref() else {
            log::debug!("Skipping draw before the first viewport update");
            return Ok(());
        };
        if self.size == (0, 0) {
            return Ok(());
        }
        let result = pass(&mut self.backend, frame);
        self.guard(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SoftwareBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn set(n: usize) -> InstanceBufferSet {
        let mut s = InstanceBufferSet::with_capacity(n);
        for i in 0..n {
            s.position_high.push(i as f32);
            s.position_low.push(0.0);
            s.value.push(0.0);
            s.color.push(0.0);
            s.shape_class.push(0);
            s.opacity.push(1.0);
            s.size_multiplier.push(1.0);
            s.highlight.push(0);
        }
        s
    }

    #[test]
    fn test_upload_is_deferred_until_sized() {
        let mut ctx = BackendContext::new(SoftwareBackend::new());
        ctx.upload(set(3)).unwrap();
        assert!(ctx.backend().buffer_words(Attribute::Value).is_empty());

        assert!(ctx.ensure_size(8, 8).unwrap());
        assert_eq!(ctx.backend().buffer_words(Attribute::Value).len(), 3);
        assert!(!ctx.ensure_size(8, 8).unwrap());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut ctx = BackendContext::new(SoftwareBackend::new());
        let mut bad = set(3);
        bad.opacity.pop();
        assert!(matches!(
            ctx.upload(bad),
            Err(EngineError::BufferLengthMismatch { .. })
        ));
        assert!(ctx.instances().is_none());
    }

    #[test]
    fn test_loss_reported_once() {
        let mut ctx = BackendContext::new(SoftwareBackend::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        ctx.on_event(move |e| sink.borrow_mut().push(e));
        ctx.ensure_size(8, 8).unwrap();

        ctx.backend_mut().simulate_loss();
        assert!(ctx.check_alive().is_err());
        assert!(ctx.check_alive().is_err());
        assert_eq!(*events.borrow(), vec![ContextEvent::Lost]);

        ctx.restore().unwrap();
        assert!(ctx.check_alive().is_ok());
        assert_eq!(*events.borrow(), vec![ContextEvent::Lost, ContextEvent::Restored]);
    }
}
