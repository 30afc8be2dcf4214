//! Helper registration contract
//!
//! A helper declares the argument kinds it expects through a [`Signature`];
//! the evaluator checks arguments against it once per call, before
//! [`HelperDef::call`] runs. Plain Rust closures with typed parameters can be
//! registered through [`Engine::register_fn`](crate::Engine::register_fn).

pub mod builtin;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::template::ast::{Block, PathExpr};
use crate::template::renderer::{Frame, LoopMeta, Renderer};
use crate::value::{Map, Record, Value};
use std::fmt;
use std::marker::PhantomData;

/// Expected kind of a helper argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Any,
    String,
    Number,
    /// A number with no fractional part
    Integer,
    Bool,
    Sequence,
    Map,
    Record,
    /// Null, a missing trailing argument, or the inner kind
    Optional(Box<ParamKind>),
}

impl ParamKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::String => matches!(value, Value::String(_)),
            ParamKind::Number => matches!(value, Value::Number(_)),
            ParamKind::Integer => value.as_i64().is_some(),
            ParamKind::Bool => matches!(value, Value::Bool(_)),
            ParamKind::Sequence => matches!(value, Value::Seq(_)),
            ParamKind::Map => matches!(value, Value::Map(_)),
            ParamKind::Record => matches!(value, Value::Record(_)),
            ParamKind::Optional(inner) => value.is_null() || inner.accepts(value),
        }
    }

    fn is_optional(&self) -> bool {
        matches!(self, ParamKind::Optional(_))
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Any => write!(f, "any"),
            ParamKind::String => write!(f, "string"),
            ParamKind::Number => write!(f, "number"),
            ParamKind::Integer => write!(f, "integer"),
            ParamKind::Bool => write!(f, "bool"),
            ParamKind::Sequence => write!(f, "sequence"),
            ParamKind::Map => write!(f, "map"),
            ParamKind::Record => write!(f, "record"),
            ParamKind::Optional(inner) => write!(f, "optional {}", inner),
        }
    }
}

/// Positional parameter contract of a helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamKind>,
    /// Kind accepted by any arguments past `params`
    pub variadic: Option<ParamKind>,
}

impl Signature {
    pub fn exact(params: Vec<ParamKind>) -> Self {
        Self {
            params,
            variadic: None,
        }
    }

    pub fn variadic(kind: ParamKind) -> Self {
        Self {
            params: Vec::new(),
            variadic: Some(kind),
        }
    }

    pub fn with_rest(params: Vec<ParamKind>, rest: ParamKind) -> Self {
        Self {
            params,
            variadic: Some(rest),
        }
    }

    /// Number of leading parameters that must be supplied
    pub fn required(&self) -> usize {
        self.params
            .iter()
            .rposition(|kind| !kind.is_optional())
            .map_or(0, |last| last + 1)
    }

    /// Check `args` against the contract, padding omitted optional
    /// trailing parameters with Null
    pub fn check(&self, helper: &str, args: &mut Vec<Value>) -> Result<()> {
        let required = self.required();

        if args.len() < required || (self.variadic.is_none() && args.len() > self.params.len()) {
            let expected = match (&self.variadic, required == self.params.len()) {
                (Some(_), _) => format!("at least {}", required),
                (None, true) => required.to_string(),
                (None, false) => format!("{} to {}", required, self.params.len()),
            };
            return Err(Error::argument_mismatch(
                helper,
                format!("expected {} argument(s), got {}", expected, args.len()),
            ));
        }

        for (position, arg) in args.iter().enumerate() {
            let kind = self.params.get(position).or(self.variadic.as_ref());
            if let Some(kind) = kind {
                if !kind.accepts(arg) {
                    return Err(Error::argument_mismatch(
                        helper,
                        format!(
                            "argument {} must be {}, got {}",
                            position + 1,
                            kind,
                            arg.kind()
                        ),
                    ));
                }
            }
        }

        while args.len() < self.params.len() {
            args.push(Value::Null);
        }

        Ok(())
    }
}

/// A named function callable from templates
pub trait HelperDef: Send + Sync {
    /// Accepts any number of arguments of any kind unless overridden
    fn signature(&self) -> Signature {
        Signature::variadic(ParamKind::Any)
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value>;
}

impl<F> HelperDef for F
where
    F: Fn(&[Value], &mut Options<'_, '_>) -> Result<Value> + Send + Sync,
{
    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        self(args, options)
    }
}

/// Invocation details handed to a helper alongside its arguments
pub struct Options<'r, 'e> {
    name: &'r str,
    hash: Map,
    block: Option<&'r Block>,
    renderer: &'r mut Renderer<'e>,
}

impl<'r, 'e> Options<'r, 'e> {
    pub(crate) fn new(
        name: &'r str,
        hash: Map,
        block: Option<&'r Block>,
        renderer: &'r mut Renderer<'e>,
    ) -> Self {
        Self {
            name,
            hash,
            block,
            renderer,
        }
    }

    /// Name the helper was invoked under
    pub fn name(&self) -> &str {
        self.name
    }

    /// Evaluated `key=value` arguments, in source order
    pub fn hash(&self) -> &Map {
        &self.hash
    }

    pub fn hash_value(&self, key: &str) -> Option<&Value> {
        self.hash.get(key)
    }

    pub fn is_block(&self) -> bool {
        self.block.is_some()
    }

    pub fn has_inverse(&self) -> bool {
        self.block.is_some_and(|block| block.inverse.is_some())
    }

    /// Value of the current context frame
    pub fn this(&self) -> &Value {
        &self.renderer.current().this
    }

    /// Resolve a dotted path against the current frame
    pub fn resolve(&self, path: &str) -> Value {
        self.renderer.resolve_path(&PathExpr::parse(path))
    }

    pub fn engine(&self) -> &Engine {
        self.renderer.engine()
    }

    /// Render the positive body with the current frame; empty outside a block
    pub fn render_block(&mut self) -> Result<String> {
        match self.block {
            Some(block) => self.renderer.render_to_string(&block.program),
            None => Ok(String::new()),
        }
    }

    /// Render the positive body inside a new frame holding `context`
    pub fn render_block_with(&mut self, context: Value) -> Result<String> {
        match self.block {
            Some(block) => self
                .renderer
                .render_with_frame(&block.program, Frame::new(context)),
            None => Ok(String::new()),
        }
    }

    pub fn render_block_with_loop(&mut self, context: Value, meta: LoopMeta) -> Result<String> {
        match self.block {
            Some(block) => self
                .renderer
                .render_with_frame(&block.program, Frame::with_loop(context, meta)),
            None => Ok(String::new()),
        }
    }

    /// Render the `{{else}}` section with the current frame; empty when absent
    pub fn render_inverse(&mut self) -> Result<String> {
        match self.block.and_then(|block| block.inverse.as_deref()) {
            Some(inverse) => self.renderer.render_to_string(inverse),
            None => Ok(String::new()),
        }
    }

    pub fn render_inverse_with(&mut self, context: Value) -> Result<String> {
        match self.block.and_then(|block| block.inverse.as_deref()) {
            Some(inverse) => self.renderer.render_with_frame(inverse, Frame::new(context)),
            None => Ok(String::new()),
        }
    }
}

/// Conversion from an argument value into a typed closure parameter
pub trait FromValue: Sized {
    fn param_kind() -> ParamKind;
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn param_kind() -> ParamKind {
        ParamKind::Any
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for String {
    fn param_kind() -> ParamKind {
        ParamKind::String
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for bool {
    fn param_kind() -> ParamKind {
        ParamKind::Bool
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for f64 {
    fn param_kind() -> ParamKind {
        ParamKind::Number
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn param_kind() -> ParamKind {
                    ParamKind::Integer
                }

                fn from_value(value: &Value) -> Option<Self> {
                    value.as_i64().and_then(|n| <$ty>::try_from(n).ok())
                }
            }
        )*
    };
}

int_from_value!(i32, i64, u32, u64, usize);

impl FromValue for Vec<Value> {
    fn param_kind() -> ParamKind {
        ParamKind::Sequence
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_seq().map(<[Value]>::to_vec)
    }
}

impl FromValue for Map {
    fn param_kind() -> ParamKind {
        ParamKind::Map
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_map().cloned()
    }
}

impl FromValue for Record {
    fn param_kind() -> ParamKind {
        ParamKind::Record
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_record().cloned()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn param_kind() -> ParamKind {
        ParamKind::Optional(Box::new(T::param_kind()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            Some(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

/// Conversion from a typed closure's return value into helper output
pub trait IntoHelperOutput {
    fn into_output(self, helper: &str) -> Result<Value>;
}

impl IntoHelperOutput for Value {
    fn into_output(self, _helper: &str) -> Result<Value> {
        Ok(self)
    }
}

macro_rules! into_output_via_from {
    ($($ty:ty),*) => {
        $(
            impl IntoHelperOutput for $ty {
                fn into_output(self, _helper: &str) -> Result<Value> {
                    Ok(Value::from(self))
                }
            }
        )*
    };
}

into_output_via_from!(String, &'static str, bool, f64, i32, i64, u32, u64, usize);

impl<T: IntoHelperOutput> IntoHelperOutput for Option<T> {
    fn into_output(self, helper: &str) -> Result<Value> {
        match self {
            Some(value) => value.into_output(helper),
            None => Ok(Value::Null),
        }
    }
}

/// Errors from the closure surface as helper failures
impl<T: IntoHelperOutput, E: fmt::Display> IntoHelperOutput for std::result::Result<T, E> {
    fn into_output(self, helper: &str) -> Result<Value> {
        match self {
            Ok(value) => value.into_output(helper),
            Err(err) => Err(Error::helper(helper, err.to_string())),
        }
    }
}

/// A closure with typed parameters, adapted into a [`HelperDef`]
pub struct FnHelper<F, M> {
    f: F,
    _marker: PhantomData<fn() -> M>,
}

/// Closures convertible into helpers; `M` is the closure's `fn` type
pub trait IntoHelper<M> {
    type Helper: HelperDef + 'static;

    fn into_helper(self) -> Self::Helper;
}

macro_rules! impl_into_helper {
    ($($ty:ident $var:ident),*) => {
        impl<F, R, $($ty,)*> HelperDef for FnHelper<F, fn($($ty,)*) -> R>
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoHelperOutput + 'static,
            $($ty: FromValue + 'static,)*
        {
            fn signature(&self) -> Signature {
                Signature::exact(vec![$($ty::param_kind()),*])
            }

            #[allow(unused_mut, unused_variables)]
            fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
                let mut args = args.iter();
                $(
                    let $var = args
                        .next()
                        .and_then($ty::from_value)
                        .ok_or_else(|| {
                            Error::argument_mismatch(
                                options.name(),
                                format!("expected {}", $ty::param_kind()),
                            )
                        })?;
                )*
                (self.f)($($var),*).into_output(options.name())
            }
        }

        impl<F, R, $($ty,)*> IntoHelper<fn($($ty,)*) -> R> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoHelperOutput + 'static,
            $($ty: FromValue + 'static,)*
        {
            type Helper = FnHelper<F, fn($($ty,)*) -> R>;

            fn into_helper(self) -> Self::Helper {
                FnHelper {
                    f: self,
                    _marker: PhantomData,
                }
            }
        }
    };
}

impl_into_helper!();
impl_into_helper!(A1 a1);
impl_into_helper!(A1 a1, A2 a2);
impl_into_helper!(A1 a1, A2 a2, A3 a3);
impl_into_helper!(A1 a1, A2 a2, A3 a3, A4 a4);
