//! Server-side handlers for exported objects.
//!
//! A handler is anything implementing [`Interface`]. The common way to get
//! one is [`InterfaceBuilder`], which registers each method together with
//! its input and output signatures; both are validated once, at
//! registration, and the dispatcher uses the declared input signature to
//! reject mismatched calls with `org.freedesktop.DBus.Error.InvalidArgs`
//! before the handler runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::error;

use crate::org_freedesktop_dbus as fdo;
use crate::{Result, SignatureBuf, Value};

use crate::error::ErrorKind;
use crate::names::{is_error_name, is_member_name};
use crate::Error;

/// An error reply produced by an exported method.
#[derive(Debug, Clone)]
pub struct ReplyError {
    name: String,
    body: Vec<Value>,
}

impl ReplyError {
    /// Construct an error reply with the given name and a human readable
    /// message.
    ///
    /// The name must be a valid error name; it is sent to the peer in the
    /// `ERROR_NAME` header.
    pub fn new(name: &str, message: &str) -> Self {
        debug_assert!(is_error_name(name), "invalid error name {name:?}");

        Self {
            name: name.to_owned(),
            body: vec![Value::from(message)],
        }
    }

    /// Construct an error reply with an arbitrary body.
    pub fn with_body(name: &str, body: Vec<Value>) -> Self {
        debug_assert!(is_error_name(name), "invalid error name {name:?}");

        Self {
            name: name.to_owned(),
            body,
        }
    }

    /// The generic `org.freedesktop.DBus.Error.Failed` reply.
    pub fn failed(message: &str) -> Self {
        Self::new(fdo::ERROR_FAILED, message)
    }

    /// The `org.freedesktop.DBus.Error.InvalidArgs` reply.
    pub fn invalid_args(message: &str) -> Self {
        Self::new(fdo::ERROR_INVALID_ARGS, message)
    }

    /// The `org.freedesktop.DBus.Error.UnknownMethod` reply.
    pub fn unknown_method(member: &str) -> Self {
        Self::new(
            fdo::ERROR_UNKNOWN_METHOD,
            &format!("no method {member} here"),
        )
    }

    /// The error name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The body of the reply.
    pub fn body(&self) -> &[Value] {
        &self.body
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Value>) {
        (self.name, self.body)
    }
}

/// A handler for method calls directed at one interface of an exported
/// object.
#[async_trait]
pub trait Interface: Send + Sync {
    /// The declared input signature of the named method, or `None` when
    /// the method does not exist.
    fn input_signature(&self, member: &str) -> Option<SignatureBuf>;

    /// Invoke a method.
    ///
    /// The dispatcher has already checked `args` against the declared
    /// input signature.
    async fn call(&self, member: &str, args: Vec<Value>) -> Result<Vec<Value>, ReplyError>;
}

type Handler =
    Box<dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Vec<Value>, ReplyError>> + Send + Sync>;

struct Method {
    inputs: SignatureBuf,
    outputs: SignatureBuf,
    handler: Handler,
}

/// Build an [`Interface`] by registering methods one at a time.
///
/// # Examples
///
/// ```
/// use wirebus::{InterfaceBuilder, Value};
///
/// let interface = InterfaceBuilder::new()
///     .method("Sum", "uu", "u", |args| async move {
///         let (Some(Value::U32(a)), Some(Value::U32(b))) = (args.first(), args.get(1)) else {
///             unreachable!("dispatch checks the signature");
///         };
///
///         Ok(vec![Value::U32(a.wrapping_add(*b))])
///     })?
///     .build();
/// # Ok::<_, wirebus::Error>(())
/// ```
#[derive(Default)]
pub struct InterfaceBuilder {
    methods: HashMap<String, Method>,
}

impl InterfaceBuilder {
    /// Construct an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method with its input and output signatures.
    ///
    /// Empty strings stand for no arguments and no return values.
    ///
    /// # Errors
    ///
    /// Errors when the member name or either signature is invalid. This is
    /// the registration-time validation; nothing is checked again per
    /// call beyond the input signature match.
    pub fn method<F, Fut>(
        mut self,
        name: &str,
        inputs: &str,
        outputs: &str,
        handler: F,
    ) -> Result<Self>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Value>, ReplyError>> + Send + 'static,
    {
        if !is_member_name(name) {
            return Err(Error::new(ErrorKind::InvalidMemberName));
        }

        let inputs = parse_arity(inputs)?;
        let outputs = parse_arity(outputs)?;

        self.methods.insert(
            name.to_owned(),
            Method {
                inputs,
                outputs,
                handler: Box::new(move |args| Box::pin(handler(args))),
            },
        );

        Ok(self)
    }

    /// Finish the builder.
    pub fn build(self) -> Arc<dyn Interface> {
        Arc::new(Built {
            methods: self.methods,
        })
    }
}

fn parse_arity(signature: &str) -> Result<SignatureBuf> {
    if signature.is_empty() {
        return Ok(SignatureBuf::empty());
    }

    Ok(SignatureBuf::new(signature)?)
}

struct Built {
    methods: HashMap<String, Method>,
}

#[async_trait]
impl Interface for Built {
    fn input_signature(&self, member: &str) -> Option<SignatureBuf> {
        Some(self.methods.get(member)?.inputs.clone())
    }

    async fn call(&self, member: &str, args: Vec<Value>) -> Result<Vec<Value>, ReplyError> {
        let Some(method) = self.methods.get(member) else {
            return Err(ReplyError::unknown_method(member));
        };

        let values = (method.handler)(args).await?;

        // A handler returning something other than what it declared is a
        // bug in the exported object, not in the peer.
        let produced = Value::signature_of(&values)
            .map(|signature| signature == method.outputs)
            .unwrap_or(false);

        if !produced {
            error!(member, "handler returned values not matching its declared signature");
            return Err(ReplyError::failed("internal signature mismatch"));
        }

        Ok(values)
    }
}
