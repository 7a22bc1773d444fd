//! # Before-action hooks
//!
//! Named hooks that run ahead of a controller action, optionally restricted with
//! an `only` or `except` list of action names.

use std::{collections::HashSet, fmt, sync::Arc};

use crate::{
    auth::authorize,
    config::split_list,
    controller::RequestContext,
    error::{ApiError, AuthError},
};

/// Action
///
/// The five generic operations a resource controller dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Index,
    Save,
    Read,
    Update,
    Delete,
}

impl Action {
    /// The action name used by `only`/`except` selectors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::Save => "save",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ActionList
///
/// A set of action names. Built from a comma-joined string (`"read,update"`)
/// or a literal list; both end up as the same membership test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionList(HashSet<String>);

impl ActionList {
    pub fn contains(&self, action: &str) -> bool {
        self.0.contains(action)
    }
}

impl From<&str> for ActionList {
    fn from(raw: &str) -> Self {
        Self(split_list(raw).into_iter().collect())
    }
}

impl From<String> for ActionList {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<Vec<&str>> for ActionList {
    fn from(items: Vec<&str>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Vec<String>> for ActionList {
    fn from(items: Vec<String>) -> Self {
        items.iter().map(String::as_str).collect()
    }
}

impl<const N: usize> From<[&str; N]> for ActionList {
    fn from(items: [&str; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<'a> FromIterator<&'a str> for ActionList {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// When a hook applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionSelector {
    #[default]
    Always,
    Only(ActionList),
    Except(ActionList),
}

impl ActionSelector {
    pub fn matches(&self, action: Action) -> bool {
        match self {
            ActionSelector::Always => true,
            ActionSelector::Only(list) => list.contains(action.as_str()),
            ActionSelector::Except(list) => !list.contains(action.as_str()),
        }
    }
}

pub type HookFn = Arc<dyn Fn(&RequestContext) -> Result<(), ApiError> + Send + Sync>;

/// BeforeAction
///
/// A named hook plus its selector. Controllers run them in declaration order;
/// the first error stops the request and becomes the response.
#[derive(Clone)]
pub struct BeforeAction {
    name: String,
    selector: ActionSelector,
    hook: HookFn,
}

impl fmt::Debug for BeforeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeAction")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl BeforeAction {
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            selector: ActionSelector::Always,
            hook: Arc::new(hook),
        }
    }

    /// Restricts the hook to the listed actions.
    pub fn only(mut self, actions: impl Into<ActionList>) -> Self {
        self.selector = ActionSelector::Only(actions.into());
        self
    }

    /// Runs the hook for every action except the listed ones.
    pub fn except(mut self, actions: impl Into<ActionList>) -> Self {
        self.selector = ActionSelector::Except(actions.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the hook if its selector matches the current action.
    pub fn run(&self, ctx: &RequestContext) -> Result<(), ApiError> {
        if !self.selector.matches(ctx.action) {
            return Ok(());
        }
        tracing::debug!(hook = %self.name, action = %ctx.action, "running before-action");
        (self.hook)(ctx)
    }
}

pub fn run_before_actions(hooks: &[BeforeAction], ctx: &RequestContext) -> Result<(), ApiError> {
    hooks.iter().try_for_each(|hook| hook.run(ctx))
}

/// Hook body that admits only principals of `user_type`. Anonymous requests are denied.
pub fn require_user_type(
    user_type: i64,
) -> impl Fn(&RequestContext) -> Result<(), ApiError> + Send + Sync + 'static {
    move |ctx| match &ctx.principal {
        Some(principal) => authorize(principal, user_type).map_err(ApiError::from),
        None => Err(AuthError::PermissionDenied.into()),
    }
}
