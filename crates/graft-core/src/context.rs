use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use graft_types::{Envelope, Path};

use crate::decompose::{decompose, link_target};
use crate::error::{GraftError, GraftResult};
use crate::graft::{Graft, WeakGraft};
use crate::signal::Origin;

/// Query options a context hands down to the contexts derived from it.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryOptions {
    pub once_timeout: Duration,
}

/// What [`Context::get`] appends.
#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    /// A segment, or several joined by the store's separator.
    Text(String),
    /// Keys applied one after another.
    List(Vec<Key>),
    /// Jump to this absolute path.
    Absolute(Path),
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Key {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for Key {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

macro_rules! integer_keys {
    ($($t:ty),*) => {$(
        impl From<$t> for Key {
            fn from(n: $t) -> Self {
                Self::Text(n.to_string())
            }
        }
    )*};
}

integer_keys!(u32, u64, usize, i32, i64);

impl<K: Into<Key>> From<Vec<K>> for Key {
    fn from(keys: Vec<K>) -> Self {
        Self::List(keys.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Key {
    fn from(keys: [&str; N]) -> Self {
        Self::List(keys.into_iter().map(Key::from).collect())
    }
}

impl From<&[&str]> for Key {
    fn from(keys: &[&str]) -> Self {
        Self::List(keys.iter().copied().map(Key::from).collect())
    }
}

impl From<Path> for Key {
    fn from(path: Path) -> Self {
        Self::Absolute(path)
    }
}

impl From<&Context> for Key {
    fn from(ctx: &Context) -> Self {
        Self::Absolute(ctx.path.clone())
    }
}

/// What [`Context::put`] writes.
#[derive(Clone, Debug, PartialEq)]
pub enum PutValue {
    /// Plain data: objects and arrays are decomposed, scalars written as is.
    Data(Value),
    /// A reference edge to another path.
    Link(Path),
}

impl From<Value> for PutValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<&Context> for PutValue {
    fn from(ctx: &Context) -> Self {
        Self::Link(ctx.path.clone())
    }
}

impl From<Context> for PutValue {
    fn from(ctx: Context) -> Self {
        Self::Link(ctx.path)
    }
}

impl From<&str> for PutValue {
    fn from(text: &str) -> Self {
        Self::Data(Value::from(text))
    }
}

impl From<String> for PutValue {
    fn from(text: String) -> Self {
        Self::Data(Value::from(text))
    }
}

impl From<bool> for PutValue {
    fn from(b: bool) -> Self {
        Self::Data(Value::from(b))
    }
}

impl From<i64> for PutValue {
    fn from(n: i64) -> Self {
        Self::Data(Value::from(n))
    }
}

impl From<f64> for PutValue {
    fn from(n: f64) -> Self {
        Self::Data(Value::from(n))
    }
}

/// A location in a store's graph.
///
/// Contexts are immutable and cheap to clone: the path shares its prefix
/// with the context it was derived from, and options are shared until one
/// is overridden. A context owns nothing external.
#[derive(Clone)]
pub struct Context {
    graft: Graft,
    path: Path,
    options: Arc<QueryOptions>,
}

/// Non-owning form of a context, held by long-lived listeners.
#[derive(Clone)]
pub(crate) struct WeakContext {
    graft: WeakGraft,
    path: Path,
    options: Arc<QueryOptions>,
}

impl WeakContext {
    pub fn upgrade(&self) -> Option<Context> {
        Some(Context {
            graft: self.graft.upgrade()?,
            path: self.path.clone(),
            options: Arc::clone(&self.options),
        })
    }
}

impl Context {
    pub(crate) fn root(graft: Graft) -> Self {
        let options = Arc::new(QueryOptions {
            once_timeout: graft.config().once_timeout(),
        });
        Self {
            graft,
            path: Path::root(),
            options,
        }
    }

    fn at(&self, path: Path) -> Self {
        Self {
            graft: self.graft.clone(),
            path,
            options: Arc::clone(&self.options),
        }
    }

    /// Context one segment below this one, taken literally.
    pub(crate) fn child(&self, segment: impl Into<String>) -> Self {
        self.at(self.path.child(segment))
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext {
            graft: self.graft.downgrade(),
            path: self.path.clone(),
            options: Arc::clone(&self.options),
        }
    }

    /// Context at this path extended by `key`.
    ///
    /// Text keys are split on the separator and empty segments skipped, so
    /// an empty key returns this same location.
    pub fn get(&self, key: impl Into<Key>) -> Context {
        match key.into() {
            Key::Text(text) => {
                let separator = self.graft.separator();
                let path = text
                    .split(separator)
                    .filter(|s| !s.is_empty())
                    .fold(self.path.clone(), |path, segment| path.child(segment));
                self.at(path)
            }
            Key::List(keys) => keys.into_iter().fold(self.clone(), |ctx, key| ctx.get(key)),
            Key::Absolute(path) => self.at(path),
        }
    }

    pub fn graft(&self) -> &Graft {
        &self.graft
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The serialized path.
    pub fn key(&self) -> String {
        self.path.join(self.graft.separator())
    }

    /// The last segment, or `""` at the root.
    pub fn name(&self) -> &str {
        self.path.last().unwrap_or("")
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// This context with a different `once` wait, inherited by everything
    /// derived from it.
    pub fn with_once_timeout(&self, once_timeout: Duration) -> Context {
        Self {
            graft: self.graft.clone(),
            path: self.path.clone(),
            options: Arc::new(QueryOptions { once_timeout }),
        }
    }

    /// Write `value` here.
    ///
    /// Objects and arrays are flattened into one elementary write per leaf
    /// plus a reference edge per nested container; each write enters the
    /// `in` stage on its own, so a put is not atomic. Scalars, `null` and
    /// links at the root or a top-level key are rejected with
    /// [`GraftError::InvalidRootWrite`].
    pub async fn put(&self, value: impl Into<PutValue>) -> GraftResult<()> {
        let separator = self.graft.separator();
        let value = match value.into() {
            PutValue::Data(data) => match link_target(&data) {
                Some(target) => PutValue::Link(Path::parse(target, separator)),
                None => PutValue::Data(data),
            },
            link => link,
        };
        let container = matches!(value, PutValue::Data(Value::Object(_) | Value::Array(_)));
        if self.path.len() <= 1 && !container {
            return Err(GraftError::InvalidRootWrite { path: self.key() });
        }

        let now = self.graft.now();
        let writes = match &value {
            PutValue::Link(target) => vec![Envelope::reference(self.key(), now, target.join(separator))],
            PutValue::Data(data) if container => decompose(&self.path, data, now, separator),
            PutValue::Data(scalar) => vec![Envelope::scalar(self.key(), now, scalar.clone())],
        };
        debug!(path = %self.key(), writes = writes.len(), "put decomposed");
        for env in writes {
            self.graft.inject(env, Origin::Local).await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.key())
            .field("options", &self.options)
            .finish()
    }
}
