use crate::sink::OutputSink;

/// Outputs in configuration order. Append-only: an output stays registered
/// for the whole session, whatever its state.
pub struct OutputRegistry<M> {
    sinks: Vec<OutputSink<M>>,
}

impl<M> OutputRegistry<M> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Returns the slot the sink was stored at.
    pub fn append(&mut self, sink: OutputSink<M>) -> usize {
        self.sinks.push(sink);
        self.sinks.len() - 1
    }

    pub fn get(&self, slot: usize) -> Option<&OutputSink<M>> {
        self.sinks.get(slot)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutputSink<M>> {
        self.sinks.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, OutputSink<M>> {
        self.sinks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<M> Default for OutputRegistry<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, M> IntoIterator for &'a OutputRegistry<M> {
    type Item = &'a OutputSink<M>;
    type IntoIter = std::slice::Iter<'a, OutputSink<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
