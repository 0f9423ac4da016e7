//! Core data types: items, actions and scored items.

use crate::error::IndexError;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Items are shared between concurrently built result sets.
pub type SharedItem = Arc<Item>;

/// Type alias for the raw match score produced by handlers.
///
/// Handlers report scores in `[0, 1]`, where `1.0` is a perfect match and `0.0`
/// means "no textual match" (e.g. items listed for an empty query). The ranking
/// step rewrites the score into one of the usage bands, see
/// [`UsageScoring::apply`](crate::usage::UsageScoring::apply).
pub type Score = f32;

/// The score of a perfect textual match.
pub const PERFECT_MATCH: Score = 1.0;

/// A side-effecting action attached to an [`Item`].
#[derive(Clone)]
pub struct Action {
  /// Identifier of the action, unique within its item.
  pub id: String,
  /// Human readable label.
  pub text: String,
  callback: Arc<dyn Fn() + Send + Sync>,
}

impl Action {
  /// Creates a new action running `callback` on activation.
  pub fn new(
    id: impl Into<String>,
    text: impl Into<String>,
    callback: impl Fn() + Send + Sync + 'static,
  ) -> Self {
    Self {
      id: id.into(),
      text: text.into(),
      callback: Arc::new(callback),
    }
  }

  /// Runs the action's side effect.
  pub fn activate(&self) {
    (self.callback)()
  }
}

impl fmt::Debug for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Action")
      .field("id", &self.id)
      .field("text", &self.text)
      .finish_non_exhaustive()
  }
}

impl Serialize for Action {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut state = serializer.serialize_struct("Action", 2)?;
    state.serialize_field("id", &self.id)?;
    state.serialize_field("text", &self.text)?;
    state.end()
  }
}

/// A result item as presented to the user.
///
/// Items are immutable once built. The `id` must be unique within the owning
/// extension since usage statistics are keyed by `(extension id, item id)`.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
  /// Identifier of the item, unique within its extension.
  pub id: String,
  /// Main display text. Its length is used as a scoring divisor.
  pub text: String,
  /// Secondary display text.
  #[serde(skip_serializing_if = "String::is_empty")]
  pub subtext: String,
  /// Icon references, resolved by the frontend.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub icon_urls: Vec<String>,
  /// Text the frontend may complete the input with.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input_action_text: Option<String>,
  /// Ordered actions. The first one is the default action.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub actions: Vec<Action>,
}

impl Item {
  /// Creates a new `ItemBuilder`.
  pub fn builder(id: impl Into<String>, text: impl Into<String>) -> ItemBuilder {
    ItemBuilder {
      id: id.into(),
      text: text.into(),
      subtext: String::new(),
      icon_urls: Vec::new(),
      input_action_text: None,
      actions: Vec::new(),
    }
  }

  /// Length of `text` in grapheme clusters.
  pub fn text_length(&self) -> usize {
    self.text.graphemes(true).count()
  }

  /// Checks the item contract: `id` and `text` must be non-empty.
  pub fn validate(&self) -> Result<(), IndexError> {
    if self.id.is_empty() {
      return Err(IndexError::MalformedItem {
        id: self.id.clone(),
        reason: "empty id",
      });
    }
    if self.text.is_empty() {
      return Err(IndexError::MalformedItem {
        id: self.id.clone(),
        reason: "empty text",
      });
    }
    Ok(())
  }
}

/// A builder for [`Item`]s.
#[derive(Debug)]
pub struct ItemBuilder {
  id: String,
  text: String,
  subtext: String,
  icon_urls: Vec<String>,
  input_action_text: Option<String>,
  actions: Vec<Action>,
}

impl ItemBuilder {
  /// Sets the secondary display text.
  pub fn subtext(mut self, subtext: impl Into<String>) -> Self {
    self.subtext = subtext.into();
    self
  }

  /// Adds an icon reference.
  pub fn icon(mut self, url: impl Into<String>) -> Self {
    self.icon_urls.push(url.into());
    self
  }

  /// Sets the completion text.
  pub fn input_action_text(mut self, text: impl Into<String>) -> Self {
    self.input_action_text = Some(text.into());
    self
  }

  /// Appends an action.
  pub fn action(mut self, action: Action) -> Self {
    self.actions.push(action);
    self
  }

  /// Builds the item.
  pub fn build(self) -> Item {
    Item {
      id: self.id,
      text: self.text,
      subtext: self.subtext,
      icon_urls: self.icon_urls,
      input_action_text: self.input_action_text,
      actions: self.actions,
    }
  }

  /// Builds the item wrapped for sharing.
  pub fn shared(self) -> SharedItem {
    Arc::new(self.build())
  }
}

/// Pairs an item with one lookup string used for indexing.
///
/// An item may appear in several `IndexItem`s to be found under aliases or
/// keywords.
#[derive(Debug, Clone)]
pub struct IndexItem {
  pub item: SharedItem,
  pub string: String,
}

impl IndexItem {
  pub fn new(item: SharedItem, string: impl Into<String>) -> Self {
    Self {
      item,
      string: string.into(),
    }
  }
}

/// An item paired with its match score.
#[derive(Debug, Clone, Serialize)]
pub struct RankItem {
  pub item: SharedItem,
  pub score: Score,
}

impl RankItem {
  pub fn new(item: SharedItem, score: Score) -> Self {
    Self { item, score }
  }
}
