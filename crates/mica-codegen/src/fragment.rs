//! The fragment stack: pending blocks of instruction text.
//!
//! Each lowering step pops the fragments of its already generated parts,
//! stitches them together and pushes exactly one fragment back. Popping an
//! empty stack means a caller broke that protocol, so it panics.

use log::trace;

#[derive(Debug, Default, Clone)]
pub struct FragmentStack {
    frags: Vec<String>,
}

impl FragmentStack {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, frag: String) {
        trace!("push fragment #{} ({} bytes)", self.frags.len(), frag.len());
        self.frags.push(frag);
    }

    pub fn pop(&mut self) -> String {
        match self.frags.pop() {
            Some(frag) => frag,
            None => panic!("fragment stack underflow"),
        }
    }

    pub fn peek(&self) -> Option<&str> { self.frags.last().map(String::as_str) }

    pub fn peek_mut(&mut self) -> &mut String {
        match self.frags.last_mut() {
            Some(frag) => frag,
            None => panic!("fragment stack is empty"),
        }
    }

    pub fn len(&self) -> usize { self.frags.len() }
    pub fn is_empty(&self) -> bool { self.frags.is_empty() }

    /// Seeds a block that nested statements are folded into.
    pub fn insert_empty(&mut self) { self.push(String::new()); }

    /// Pops the top fragment and prepends it to the new top.
    pub fn combine_top_two(&mut self) {
        let top = self.pop();
        self.peek_mut().insert_str(0, &top);
    }

    /// Removes every fragment, bottom first.
    pub fn take_all(&mut self) -> Vec<String> { std::mem::take(&mut self.frags) }

    pub fn iter(&self) -> impl Iterator<Item = &str> { self.frags.iter().map(String::as_str) }
}
