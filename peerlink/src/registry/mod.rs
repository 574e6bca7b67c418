//! The handler registry: an immutable-by-swap dictionary of named event, RPC, and subscription
//! handlers.
//!
//! Handlers are registered through [`ApiBuilder`], which records each handler's accepted
//! argument counts up front, so a misconfigured dictionary fails at [`ApiBuilder::build`] rather
//! than at the first unrelated dispatch.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

use serde_json::Value;
use smallvec::SmallVec;
use tokio::sync::mpsc;

use crate::core::hash::HashMap;

/// A boxed, `Send` future, used for handler return types since this crate is built against
/// stable-Rust trait objects rather than `async fn` in traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The set of declared argument counts a handler accepts.
///
/// A fixed set of accepted counts, plus an optional variadic fallback. Arity is the *only* axis
/// of overload resolution — there is no type-based disambiguation.
#[derive(Debug, Clone, Default)]
pub struct Arity {
    fixed: SmallVec<[usize; 2]>,
    variadic: bool,
}

impl Arity {
    /// A handler that accepts exactly `n` arguments.
    pub fn exact(n: usize) -> Self {
        Self {
            fixed: SmallVec::from_iter([n]),
            variadic: false,
        }
    }

    /// A handler that accepts any of the given argument counts.
    pub fn one_of<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        Self {
            fixed: counts.into_iter().collect(),
            variadic: false,
        }
    }

    /// Marks the arity as accepting a variadic fallback in addition to any fixed counts.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    /// A handler with no fixed arities, callable only through the variadic fallback.
    pub fn any() -> Self {
        Self {
            fixed: SmallVec::new(),
            variadic: true,
        }
    }

    /// Resolves `got` arguments against this arity.
    ///
    /// Returns the arguments the handler should actually be invoked with. A variadic fallback is
    /// invoked with *no* arguments when none of the fixed arities match — this looks surprising,
    /// but it is the intended behavior, not an oversight.
    pub fn resolve(&self, args: Vec<Value>) -> Result<Vec<Value>, usize> {
        if self.fixed.contains(&args.len()) {
            Ok(args)
        } else if self.variadic {
            Ok(Vec::new())
        } else {
            Err(args.len())
        }
    }
}

/// The category a handler dictionary entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Event,
    Rpc,
    Subscription,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Rpc => "rpc",
            Self::Subscription => "subscription",
        }
    }
}

pub type EventFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync;
pub type RpcFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync;
pub type SubscriptionFn =
    dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<SubscriptionOutput>> + Send + Sync;

/// What a subscription handler hands back to the subscription stage: a producer of values, and an
/// optional hook invoked exactly once when the subscription is torn down.
///
/// A handler that only needs to hand back a receiver, with no teardown hook, can do so with
/// `.into()`, courtesy of the `From` impl below.
pub struct SubscriptionOutput {
    pub producer: mpsc::Receiver<Value>,
    pub stop: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionOutput {
    pub fn with_stop<F>(producer: mpsc::Receiver<Value>, stop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            producer,
            stop: Some(Box::new(stop)),
        }
    }
}

impl From<mpsc::Receiver<Value>> for SubscriptionOutput {
    fn from(producer: mpsc::Receiver<Value>) -> Self {
        Self {
            producer,
            stop: None,
        }
    }
}

/// A single handler dictionary entry: its callable and its declared arity.
pub struct HandlerDescriptor<F: ?Sized> {
    pub name: String,
    pub arity: Arity,
    pub handler: Arc<F>,
}

/// The three-bucket handler dictionary exposed by a [`crate::Listener`].
///
/// A snapshot is taken once per inbound request (via [`arc_swap::ArcSwap`] at the listener
/// level): each inbound request resolves against exactly one snapshot, never a mix of old and
/// new handlers.
#[derive(Default)]
pub struct Api {
    events: HashMap<String, HandlerDescriptor<EventFn>>,
    rpcs: HashMap<String, HandlerDescriptor<RpcFn>>,
    subscriptions: HashMap<String, HandlerDescriptor<SubscriptionFn>>,
}

impl Api {
    pub fn event(&self, name: &str) -> Option<&HandlerDescriptor<EventFn>> {
        self.events.get(name)
    }

    pub fn rpc(&self, name: &str) -> Option<&HandlerDescriptor<RpcFn>> {
        self.rpcs.get(name)
    }

    pub fn subscription(&self, name: &str) -> Option<&HandlerDescriptor<SubscriptionFn>> {
        self.subscriptions.get(name)
    }

    pub fn builder() -> ApiBuilder {
        ApiBuilder::default()
    }
}

/// An error raised while assembling an [`Api`] dictionary.
#[derive(Debug, thiserror::Error)]
pub enum ApiBuildError {
    #[error("duplicate {kind} handler: {name}")]
    Duplicate { kind: &'static str, name: String },
}

/// Builds an [`Api`] dictionary, failing fast on duplicate handler names within a category.
#[derive(Default)]
pub struct ApiBuilder {
    api: Api,
}

impl ApiBuilder {
    pub fn event<S, F, Fut>(mut self, name: S, arity: Arity, handler: F) -> Result<Self, ApiBuildError>
    where
        S: Into<String>,
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        if self.api.events.contains_key(&name) {
            return Err(ApiBuildError::Duplicate {
                kind: "event",
                name,
            });
        }
        self.api.events.insert(
            name.clone(),
            HandlerDescriptor {
                name,
                arity,
                handler: Arc::new(move |args| Box::pin(handler(args))),
            },
        );
        Ok(self)
    }

    pub fn rpc<S, F, Fut>(mut self, name: S, arity: Arity, handler: F) -> Result<Self, ApiBuildError>
    where
        S: Into<String>,
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let name = name.into();
        if self.api.rpcs.contains_key(&name) {
            return Err(ApiBuildError::Duplicate { kind: "rpc", name });
        }
        self.api.rpcs.insert(
            name.clone(),
            HandlerDescriptor {
                name,
                arity,
                handler: Arc::new(move |args| Box::pin(handler(args))),
            },
        );
        Ok(self)
    }

    pub fn subscription<S, F, Fut>(
        mut self,
        name: S,
        arity: Arity,
        handler: F,
    ) -> Result<Self, ApiBuildError>
    where
        S: Into<String>,
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<SubscriptionOutput>> + Send + 'static,
    {
        let name = name.into();
        if self.api.subscriptions.contains_key(&name) {
            return Err(ApiBuildError::Duplicate {
                kind: "subscription",
                name,
            });
        }
        self.api.subscriptions.insert(
            name.clone(),
            HandlerDescriptor {
                name,
                arity,
                handler: Arc::new(move |args| Box::pin(handler(args))),
            },
        );
        Ok(self)
    }

    pub fn build(self) -> Api {
        self.api
    }
}
