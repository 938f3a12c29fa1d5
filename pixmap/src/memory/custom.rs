use tracing::debug;

type ReleaseFn = Box<dyn FnOnce(Vec<u8>) + Send + Sync>;

/// Memory supplied by the caller together with the callback that takes it back.
///
/// The callback runs exactly once, when the memory is released.
pub struct CustomMemory {
    data: Vec<u8>,
    release: Option<ReleaseFn>,
}

impl CustomMemory {
    pub fn new(data: Vec<u8>, release: impl FnOnce(Vec<u8>) + Send + Sync + 'static) -> Self {
        CustomMemory {
            data,
            release: Some(Box::new(release)),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for CustomMemory {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(len = self.data.len(), "returning custom memory to its owner");
            release(core::mem::take(&mut self.data));
        }
    }
}
