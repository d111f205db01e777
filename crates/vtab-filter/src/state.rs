use std::fmt;

use crate::error::{FilterError, Result};

/// Inclusion state of an item travelling through a filter chain.
///
/// `In` is the initial state. `Discarded` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterState {
    #[default]
    In,
    Out,
    Discarded,
}

impl FilterState {
    /// Checked transition: nothing leaves `Discarded`.
    pub fn transition(self, next: FilterState) -> Result<FilterState> {
        match (self, next) {
            (Self::Discarded, Self::Discarded) => Ok(next),
            (Self::Discarded, _) => Err(FilterError::IllegalTransition {
                from: self,
                to: next,
            }),
            _ => Ok(next),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Discarded
    }
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Discarded => "DISCARDED",
        };
        f.write_str(label)
    }
}

/// Wraps an item with its current state for one chain traversal.
#[derive(Debug, Clone)]
pub struct StateEnvelope<T> {
    item: T,
    state: FilterState,
}

impl<T> StateEnvelope<T> {
    pub fn new(item: T) -> Self {
        Self {
            item,
            state: FilterState::In,
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    pub fn set_state(&mut self, next: FilterState) -> Result<()> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    pub fn into_item(self) -> T {
        self.item
    }
}
