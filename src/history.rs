use crate::annotation::Annotation;

/// Linear undo/redo log of annotation-list snapshots. A cursor tracks the
/// current position; pushing while not at the end truncates everything after
/// the cursor, so redo history is never resurrected.
#[derive(Debug)]
pub struct History {
    entries: Vec<Vec<Annotation>>,
    cursor: usize,
}

impl History {
    /// The initial (post-load) snapshot becomes entry 0; the stack is never
    /// empty afterwards.
    pub fn new(initial: Vec<Annotation>) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
        }
    }

    pub fn push(&mut self, snapshot: Vec<Annotation>) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(snapshot);
        self.cursor = self.entries.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn undo(&mut self) -> Option<Vec<Annotation>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<Vec<Annotation>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].clone())
    }

    /// The snapshot at the cursor, without moving it.
    pub fn current(&self) -> &[Annotation] {
        &self.entries[self.cursor]
    }

    /// Drop everything and restart from a single entry. Used after a version
    /// rollback loads a fresh initial state.
    pub fn reset(&mut self, initial: Vec<Annotation>) {
        self.entries.clear();
        self.entries.push(initial);
        self.cursor = 0;
    }

    #[cfg(test)]
    fn entries(&self) -> &[Vec<Annotation>] {
        &self.entries
    }
}
