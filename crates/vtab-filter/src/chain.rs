//! Generic filter chains.
//!
//! A chain runs every item through its filters in registration order and
//! keeps the items that end in [`FilterState::In`]. The first failing filter
//! aborts the whole evaluation.
//!
//! # Example
//!
//! ```ignore
//! let chain = VariableFilterChain::new("demographics")
//!     .with_filter(ExcludeAllFilter)
//!     .with_filter(VariableNameFilter::new("^(age|sex)$", FilterAction::Include)?);
//! let selected = chain.filter(table.variables()?, &())?;
//! ```

use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::state::{FilterState, StateEnvelope};

/// One step of a chain. `C` is read-only context shared by every item,
/// e.g. the table a value set belongs to.
pub trait Filter<T, C: ?Sized = ()>: Send + Sync {
    fn apply(&self, envelope: &mut StateEnvelope<T>, context: &C) -> Result<()>;
}

pub struct FilterChain<T, C: ?Sized = ()> {
    name: String,
    filters: Vec<Box<dyn Filter<T, C>>>,
}

impl<T, C: ?Sized> FilterChain<T, C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Filter<T, C> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn Filter<T, C>>) {
        self.filters.push(filter);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Final state of one item after every filter.
    pub fn evaluate(&self, item: T, context: &C) -> Result<StateEnvelope<T>> {
        let mut envelope = StateEnvelope::new(item);
        for filter in &self.filters {
            filter.apply(&mut envelope, context)?;
        }
        Ok(envelope)
    }

    pub fn accepts(&self, item: T, context: &C) -> Result<bool> {
        Ok(self.evaluate(item, context)?.state() == FilterState::In)
    }

    /// Items whose final state is `In`, in input order.
    pub fn filter<I>(&self, items: I, context: &C) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut accepted = Vec::new();
        let mut seen = 0usize;
        for item in items {
            seen += 1;
            let envelope = self.evaluate(item, context)?;
            if envelope.state() == FilterState::In {
                accepted.push(envelope.into_item());
            }
        }
        debug!(chain = %self.name, seen, accepted = accepted.len(), "filter chain evaluated");
        Ok(accepted)
    }
}

impl<T, C: ?Sized> fmt::Debug for FilterChain<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .finish()
    }
}
