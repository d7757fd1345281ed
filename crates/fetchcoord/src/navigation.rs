//! The screens of the example app, and a stack navigator to move between them.

use std::fmt;

/// A screen together with its route parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// The list of all items.
    Items,
    /// A single item. The id is missing until the user picked one.
    ItemDetails { id: Option<String> },
    /// The health status of the API.
    ApiHealth,
}

impl Screen {
    /// The route name, which does not include parameters.
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Items => "Items",
            Screen::ItemDetails { .. } => "ItemDetails",
            Screen::ApiHealth => "ApiHealth",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::ItemDetails { id: Some(id) } => write!(f, "{}({id})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// A navigation stack, which always holds at least one screen.
#[derive(Debug)]
pub struct Navigator {
    stack: Vec<Screen>,
}

impl Navigator {
    pub fn new(initial: Screen) -> Self {
        Self {
            stack: vec![initial],
        }
    }

    /// The screen on top of the stack.
    pub fn current(&self) -> &Screen {
        // the stack is never empty
        &self.stack[self.stack.len() - 1]
    }

    /// Shows `screen`.
    ///
    /// If a screen with the same route is already on the stack, everything above it is popped and
    /// its parameters are replaced. Otherwise `screen` is pushed.
    pub fn navigate(&mut self, screen: Screen) -> &Screen {
        match self.stack.iter().position(|s| s.name() == screen.name()) {
            Some(index) => {
                self.stack.truncate(index + 1);
                self.stack[index] = screen;
            }
            None => self.stack.push(screen),
        }
        tracing::debug!(screen = %self.current(), depth = self.depth(), "Navigated");
        self.current()
    }

    /// Pops the current screen, unless it is the last one.
    ///
    /// Returns the popped screen.
    pub fn back(&mut self) -> Option<Screen> {
        if self.stack.len() <= 1 {
            return None;
        }
        let popped = self.stack.pop();
        tracing::debug!(screen = %self.current(), depth = self.depth(), "Navigated back");
        popped
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Screen::Items)
    }
}
