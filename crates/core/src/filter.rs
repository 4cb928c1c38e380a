//! Include/exclude rules deciding which errors a policy handles
//!
//! A filter holds two ordered lists of entries. An error is accepted when it
//! matches at least one include entry (or there are none) and matches no
//! exclude entry. An empty filter accepts every error.
//!
//! Entries are keyed either on the error itself or on its inner error
//! (`source()`), optionally restricted to a concrete type via downcasting.

use std::any::{type_name, TypeId};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{BoxedError, SharedError};

type Predicate =
    Arc<dyn Fn(&(dyn StdError + 'static)) -> Result<bool, BoxedError> + Send + Sync + 'static>;

/// Which error an entry inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterScope {
    /// The raised error
    Error,
    /// The raised error's `source()`
    Inner,
}

#[derive(Clone)]
struct FilterEntry {
    target: Option<(TypeId, &'static str)>,
    scope: FilterScope,
    predicate: Predicate,
}

impl FilterEntry {
    fn typed<E, F>(scope: FilterScope, predicate: F) -> Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            target: Some((TypeId::of::<E>(), type_name::<E>())),
            scope,
            predicate: Arc::new(move |error| {
                Ok(error.downcast_ref::<E>().is_some_and(|typed| predicate(typed)))
            }),
        }
    }

    fn untyped<F>(predicate: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Result<bool, BoxedError> + Send + Sync + 'static,
    {
        Self { target: None, scope: FilterScope::Error, predicate: Arc::new(predicate) }
    }

    fn evaluate(&self, error: &(dyn StdError + 'static)) -> Result<bool, BoxedError> {
        let subject = match self.scope {
            FilterScope::Error => Some(error),
            FilterScope::Inner => error.source(),
        };
        match subject {
            Some(subject) => (self.predicate)(subject),
            None => Ok(false),
        }
    }
}

impl fmt::Debug for FilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterEntry")
            .field("target", &self.target.map(|(_, name)| name))
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Compiled acceptance predicate, cheap to clone and share
#[derive(Clone)]
pub struct CompiledFilter {
    included: Arc<[FilterEntry]>,
    excluded: Arc<[FilterEntry]>,
}

impl CompiledFilter {
    /// Decide whether `error` is handled.
    ///
    /// Fails when a fallible predicate fails; the decision is then unknown.
    pub fn accepts(&self, error: &(dyn StdError + 'static)) -> Result<bool, SharedError> {
        if !self.included.is_empty() {
            let mut matched = false;
            for entry in self.included.iter() {
                if entry.evaluate(error).map_err(SharedError::from)? {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Ok(false);
            }
        }

        for entry in self.excluded.iter() {
            if entry.evaluate(error).map_err(SharedError::from)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("included", &self.included.len())
            .field("excluded", &self.excluded.len())
            .finish()
    }
}

/// Builder for include/exclude error rules
#[derive(Debug, Clone, Default)]
pub struct ErrorFilter {
    included: Vec<FilterEntry>,
    excluded: Vec<FilterEntry>,
    compiled: OnceCell<CompiledFilter>,
}

impl ErrorFilter {
    /// Empty filter; accepts every error until an entry is added
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle errors of type `E`
    pub fn include_error<E: StdError + 'static>(&mut self) -> &mut Self {
        self.push_included(FilterEntry::typed::<E, _>(FilterScope::Error, |_| true))
    }

    /// Handle errors of type `E` matching `predicate`
    pub fn include_error_where<E, F>(&mut self, predicate: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.push_included(FilterEntry::typed::<E, _>(FilterScope::Error, predicate))
    }

    /// Handle errors whose `source()` is of type `E`
    pub fn include_inner_error<E: StdError + 'static>(&mut self) -> &mut Self {
        self.push_included(FilterEntry::typed::<E, _>(FilterScope::Inner, |_| true))
    }

    /// Handle errors whose `source()` is of type `E` and matches `predicate`
    pub fn include_inner_error_where<E, F>(&mut self, predicate: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.push_included(FilterEntry::typed::<E, _>(FilterScope::Inner, predicate))
    }

    /// Handle any error matching `predicate`
    pub fn include<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.push_included(FilterEntry::untyped(move |error| Ok(predicate(error))))
    }

    /// Handle any error matching a predicate that may itself fail
    pub fn try_include<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Result<bool, BoxedError> + Send + Sync + 'static,
    {
        self.push_included(FilterEntry::untyped(predicate))
    }

    /// Ignore errors of type `E`
    pub fn exclude_error<E: StdError + 'static>(&mut self) -> &mut Self {
        self.push_excluded(FilterEntry::typed::<E, _>(FilterScope::Error, |_| true))
    }

    /// Ignore errors of type `E` matching `predicate`
    pub fn exclude_error_where<E, F>(&mut self, predicate: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.push_excluded(FilterEntry::typed::<E, _>(FilterScope::Error, predicate))
    }

    /// Ignore errors whose `source()` is of type `E`
    pub fn exclude_inner_error<E: StdError + 'static>(&mut self) -> &mut Self {
        self.push_excluded(FilterEntry::typed::<E, _>(FilterScope::Inner, |_| true))
    }

    /// Ignore errors whose `source()` is of type `E` and matches `predicate`
    pub fn exclude_inner_error_where<E, F>(&mut self, predicate: F) -> &mut Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.push_excluded(FilterEntry::typed::<E, _>(FilterScope::Inner, predicate))
    }

    /// Ignore any error matching `predicate`
    pub fn exclude<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.push_excluded(FilterEntry::untyped(move |error| Ok(predicate(error))))
    }

    /// Ignore any error matching a predicate that may itself fail
    pub fn try_exclude<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&(dyn StdError + 'static)) -> Result<bool, BoxedError> + Send + Sync + 'static,
    {
        self.push_excluded(FilterEntry::untyped(predicate))
    }

    /// Append another filter's entries after this filter's own
    pub fn append(&mut self, other: &ErrorFilter) -> &mut Self {
        self.included.extend(other.included.iter().cloned());
        self.excluded.extend(other.excluded.iter().cloned());
        self.compiled = OnceCell::new();
        self
    }

    /// `true` when no include or exclude entry was added
    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    /// Number of include entries
    pub fn included_len(&self) -> usize {
        self.included.len()
    }

    /// Number of exclude entries
    pub fn excluded_len(&self) -> usize {
        self.excluded.len()
    }

    /// Snapshot the current rules into a shareable predicate
    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter {
            included: self.included.clone().into(),
            excluded: self.excluded.clone().into(),
        }
    }

    /// Decide whether `error` is handled, compiling the rules on first use
    pub fn accepts(&self, error: &(dyn StdError + 'static)) -> Result<bool, SharedError> {
        self.compiled.get_or_init(|| self.compile()).accepts(error)
    }

    fn push_included(&mut self, entry: FilterEntry) -> &mut Self {
        self.included.push(entry);
        self.compiled = OnceCell::new();
        self
    }

    fn push_excluded(&mut self, entry: FilterEntry) -> &mut Self {
        self.excluded.push(entry);
        self.compiled = OnceCell::new();
        self
    }
}

#[cfg(test)]
mod tests {
    use holdfast_common::testing::{OtherError, TestError, WrappedError};

    use super::*;

    fn accepts(filter: &ErrorFilter, error: &(dyn StdError + 'static)) -> bool {
        filter.accepts(error).unwrap_or(false)
    }

    /// Tests that an empty filter accepts everything
    #[test]
    fn test_empty_filter_accepts_all() {
        let filter = ErrorFilter::new();
        assert!(filter.is_empty());
        assert!(accepts(&filter, &TestError::transient("x")));
        assert!(accepts(&filter, &OtherError("y".into())));
    }

    /// Validates that include entries are OR-ed.
    ///
    /// Assertions:
    /// - Confirms either included type is accepted.
    /// - Confirms an unlisted type is rejected.
    #[test]
    fn test_includes_are_or_ed() {
        let mut filter = ErrorFilter::new();
        filter.include_error::<TestError>().include_error::<OtherError>();

        assert!(accepts(&filter, &TestError::transient("x")));
        assert!(accepts(&filter, &OtherError("y".into())));
        assert!(!accepts(&filter, &std::fmt::Error));
    }

    /// Validates that excludes veto an accepted error.
    ///
    /// Assertions:
    /// - Confirms an included type matching an exclude predicate is rejected.
    /// - Confirms the same type not matching the predicate is accepted.
    #[test]
    fn test_excludes_veto_includes() {
        let mut filter = ErrorFilter::new();
        filter
            .include_error::<TestError>()
            .exclude_error_where::<TestError, _>(|e| !e.transient);

        assert!(accepts(&filter, &TestError::transient("retry me")));
        assert!(!accepts(&filter, &TestError::permanent("give up")));
    }

    #[test]
    fn test_exclude_only_filter() {
        let mut filter = ErrorFilter::new();
        filter.exclude_error::<OtherError>();

        assert!(accepts(&filter, &TestError::transient("x")));
        assert!(!accepts(&filter, &OtherError("y".into())));
    }

    /// Validates inner-error entries look at `source()` only.
    ///
    /// Assertions:
    /// - Confirms a wrapper whose source is `TestError` matches.
    /// - Confirms an error without a source never matches an inner entry.
    #[test]
    fn test_inner_error_entries() {
        let mut filter = ErrorFilter::new();
        filter.include_inner_error_where::<TestError, _>(|e| e.transient);

        let wrapped = WrappedError::new("ctx", TestError::transient("inner"));
        assert!(accepts(&filter, &wrapped));

        let permanent = WrappedError::new("ctx", TestError::permanent("inner"));
        assert!(!accepts(&filter, &permanent));

        assert!(!accepts(&filter, &TestError::transient("no source")));
    }

    #[test]
    fn test_exclude_inner_error() {
        let mut filter = ErrorFilter::new();
        filter.exclude_inner_error::<TestError>();

        assert!(!accepts(&filter, &WrappedError::new("ctx", TestError::transient("x"))));
        assert!(accepts(&filter, &TestError::transient("x")));
    }

    /// Validates that a failing predicate surfaces as an error.
    ///
    /// Assertions:
    /// - Confirms `accepts` returns `Err` carrying the predicate's message.
    #[test]
    fn test_fallible_predicate_error_surfaces() {
        let mut filter = ErrorFilter::new();
        filter.try_include(|_| Err("predicate failed".into()));

        let decision = filter.accepts(&TestError::transient("x"));
        assert!(decision.is_err_and(|e| e.to_string() == "predicate failed"));
    }

    /// Validates untyped predicates and `append`.
    ///
    /// Assertions:
    /// - Confirms appended entries take part in the decision.
    /// - Confirms the compiled cache is rebuilt after `append`.
    #[test]
    fn test_append_and_untyped_predicates() {
        let mut filter = ErrorFilter::new();
        filter.include(|e| e.to_string().contains("timeout"));
        assert!(!accepts(&filter, &OtherError("refused".into())));

        let mut other = ErrorFilter::new();
        other.include_error::<OtherError>().exclude(|e| e.to_string().contains("fatal"));
        filter.append(&other);

        assert_eq!(filter.included_len(), 2);
        assert_eq!(filter.excluded_len(), 1);
        assert!(accepts(&filter, &OtherError("refused".into())));
        assert!(!accepts(&filter, &OtherError("fatal".into())));
    }

    #[test]
    fn test_compiled_filter_is_snapshot() {
        let mut filter = ErrorFilter::new();
        filter.include_error::<TestError>();
        let compiled = filter.compile();
        filter.include_error::<OtherError>();

        assert!(compiled.accepts(&OtherError("y".into())).is_ok_and(|ok| !ok));
        assert!(accepts(&filter, &OtherError("y".into())));
    }
}
