// ABOUTME: Element transforms applied to content subtrees: tag renames and custom node mutators.
// ABOUTME: Includes the built-in mutators rule data can name from JSON (unwrap, move_attr, ...).

//! Content transforms.
//!
//! A [`Transform`] is either a tag rename or a [`NodeMutator`]. Rule tables
//! written as JSON can only reference the built-in mutators through
//! [`TransformSpec`]; Rust callers can plug in any closure.

use std::fmt;
use std::sync::Arc;

use dom_query::Selection;
use serde::Deserialize;

use crate::error::ExtractError;

/// A mutation applied in place to one matched element.
///
/// Implementations must treat a missing expected structure as a no-op and
/// return `Ok(())`; an `Err` is logged as a transform failure and the
/// pipeline moves on to the next transform.
pub trait NodeMutator: Send + Sync {
    fn apply(&self, node: &Selection<'_>) -> Result<(), ExtractError>;

    /// Short label used in logs.
    fn label(&self) -> &str {
        "custom"
    }
}

impl<F> NodeMutator for F
where
    F: Fn(&Selection<'_>) -> Result<(), ExtractError> + Send + Sync,
{
    fn apply(&self, node: &Selection<'_>) -> Result<(), ExtractError> {
        self(node)
    }
}

/// A transform declared against a selector in a content rule.
#[derive(Clone, Deserialize)]
#[serde(from = "RawTransform")]
pub enum Transform {
    /// Rename the matched element, keeping attributes and children.
    RenameTag(String),
    /// Run an arbitrary mutator on the matched element.
    Custom(Arc<dyn NodeMutator>),
}

impl Transform {
    /// Wrap a mutator as a transform.
    pub fn custom(mutator: impl NodeMutator + 'static) -> Self {
        Transform::Custom(Arc::new(mutator))
    }

    /// Shorthand for a rename.
    pub fn rename(tag: impl Into<String>) -> Self {
        Transform::RenameTag(tag.into())
    }

    /// Apply the transform to a single matched element.
    pub fn apply(&self, node: &Selection<'_>) -> Result<(), ExtractError> {
        match self {
            Transform::RenameTag(tag) => {
                if tag.trim().is_empty() {
                    return Err(ExtractError::transform("rename_tag", "empty tag name"));
                }
                node.rename(tag);
                Ok(())
            }
            Transform::Custom(mutator) => mutator.apply(node),
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> &str {
        match self {
            Transform::RenameTag(_) => "rename_tag",
            Transform::Custom(m) => m.label(),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::RenameTag(tag) => f.debug_tuple("RenameTag").field(tag).finish(),
            Transform::Custom(m) => f.debug_tuple("Custom").field(&m.label()).finish(),
        }
    }
}

/// Transforms as they appear in rule data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformSpec {
    /// Rename the element to a different tag.
    #[serde(alias = "tag")]
    RenameTag { value: String },
    /// Leave the element untouched.
    Noop,
    /// Replace the element with its children.
    Unwrap,
    /// Replace a `<noscript>` with a `<div>` holding its markup.
    NoscriptToDiv,
    /// Copy attribute `from` into `to`, overwriting `to`.
    MoveAttr { from: String, to: String },
    /// Set an attribute to a fixed value.
    SetAttr { name: String, value: String },
    /// Drop an attribute.
    RemoveAttr { name: String },
    /// Replace the element with its only element child; no-op otherwise.
    UnwrapSingleChild,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTransform {
    Rename(String),
    Spec(TransformSpec),
}

impl From<RawTransform> for Transform {
    fn from(raw: RawTransform) -> Self {
        match raw {
            RawTransform::Rename(tag) => Transform::RenameTag(tag),
            RawTransform::Spec(spec) => spec.into(),
        }
    }
}

impl From<TransformSpec> for Transform {
    fn from(spec: TransformSpec) -> Self {
        match spec {
            TransformSpec::RenameTag { value } => Transform::RenameTag(value),
            other => Transform::Custom(Arc::new(BuiltinMutator(other))),
        }
    }
}

/// Mutators that rule data can name.
struct BuiltinMutator(TransformSpec);

impl NodeMutator for BuiltinMutator {
    fn apply(&self, node: &Selection<'_>) -> Result<(), ExtractError> {
        match &self.0 {
            TransformSpec::RenameTag { value } => {
                node.rename(value);
            }
            TransformSpec::Noop => {}
            TransformSpec::Unwrap => {
                let inner = node.inner_html();
                node.replace_with_html(inner);
            }
            TransformSpec::NoscriptToDiv => {
                // with scripting enabled the parser keeps noscript markup as raw text
                let raw = node.text();
                let markup = if raw.contains('<') {
                    raw.to_string()
                } else {
                    node.inner_html().to_string()
                };
                node.replace_with_html(format!("<div>{}</div>", markup));
            }
            TransformSpec::MoveAttr { from, to } => {
                if let Some(value) = node.attr(from) {
                    node.set_attr(to, &value);
                }
            }
            TransformSpec::SetAttr { name, value } => {
                node.set_attr(name, value);
            }
            TransformSpec::RemoveAttr { name } => {
                node.remove_attr(name);
            }
            TransformSpec::UnwrapSingleChild => {
                let Some(element) = node.nodes().first() else {
                    return Ok(());
                };
                let children = element.element_children();
                if children.len() == 1 {
                    let child_html = children[0].html();
                    node.replace_with_html(child_html);
                }
            }
        }
        Ok(())
    }

    fn label(&self) -> &str {
        match &self.0 {
            TransformSpec::RenameTag { .. } => "rename_tag",
            TransformSpec::Noop => "noop",
            TransformSpec::Unwrap => "unwrap",
            TransformSpec::NoscriptToDiv => "noscript_to_div",
            TransformSpec::MoveAttr { .. } => "move_attr",
            TransformSpec::SetAttr { .. } => "set_attr",
            TransformSpec::RemoveAttr { .. } => "remove_attr",
            TransformSpec::UnwrapSingleChild => "unwrap_single_child",
        }
    }
}
