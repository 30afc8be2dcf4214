//! Helpers every engine starts with

use super::{HelperDef, Options, ParamKind, Signature};
use crate::error::{Error, Result};
use crate::template::renderer::LoopMeta;
use crate::value::Value;
use log::Level;
use std::collections::HashMap;
use std::sync::Arc;

/// Log target used by the `log` helper
pub const LOG_TARGET: &str = "rustbars::log";

static NULL: Value = Value::Null;

fn arg(args: &[Value], position: usize) -> &Value {
    args.get(position).unwrap_or(&NULL)
}

fn require_block(options: &Options<'_, '_>) -> Result<()> {
    if options.is_block() {
        Ok(())
    } else {
        Err(Error::argument_mismatch(
            options.name(),
            "must be used as a block",
        ))
    }
}

/// Install the built-ins into a fresh registry
pub(crate) fn register(helpers: &mut HashMap<String, Arc<dyn HelperDef>>) {
    helpers.insert("if".to_string(), Arc::new(IfHelper));
    helpers.insert("unless".to_string(), Arc::new(UnlessHelper));
    helpers.insert("with".to_string(), Arc::new(WithHelper));
    helpers.insert("each".to_string(), Arc::new(EachHelper));
    helpers.insert("log".to_string(), Arc::new(LogHelper));
    helpers.insert("lookup".to_string(), Arc::new(LookupHelper));
    helpers.insert("equal".to_string(), Arc::new(EqualHelper));
}

/// Names of the built-in helpers
pub const NAMES: [&str; 7] = ["if", "unless", "with", "each", "log", "lookup", "equal"];

/// Renders the body when its argument is truthy, the `{{else}}` section otherwise
///
/// `includeZero=true` makes the number zero count as truthy.
pub struct IfHelper;

impl HelperDef for IfHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        require_block(options)?;

        let include_zero = options
            .hash_value("includeZero")
            .is_some_and(Value::is_truthy);
        let condition = arg(args, 0);
        let truthy = condition.is_truthy() || (include_zero && condition.as_f64() == Some(0.0));

        let output = if truthy {
            options.render_block()?
        } else {
            options.render_inverse()?
        };
        Ok(Value::String(output))
    }
}

/// `if` with the branches swapped
pub struct UnlessHelper;

impl HelperDef for UnlessHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        require_block(options)?;

        let output = if arg(args, 0).is_truthy() {
            options.render_inverse()?
        } else {
            options.render_block()?
        };
        Ok(Value::String(output))
    }
}

/// Renders the body with its argument as the new context
pub struct WithHelper;

impl HelperDef for WithHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        require_block(options)?;

        let context = arg(args, 0);
        let output = if context.is_truthy() {
            options.render_block_with(context.clone())?
        } else {
            options.render_inverse()?
        };
        Ok(Value::String(output))
    }
}

/// Renders the body once per element of a sequence, map or record
///
/// Maps iterate in insertion order and records in field order. `@key` is
/// the element index for sequences and the key or lookup name otherwise.
pub struct EachHelper;

impl HelperDef for EachHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        require_block(options)?;

        let mut output = String::new();

        match arg(args, 0) {
            Value::Seq(items) if !items.is_empty() => {
                let len = items.len();
                for (index, item) in items.iter().enumerate() {
                    let meta = LoopMeta::new(index, index, len);
                    output.push_str(&options.render_block_with_loop(item.clone(), meta)?);
                }
            }

            Value::Map(map) if !map.is_empty() => {
                let len = map.len();
                for (index, (key, item)) in map.iter().enumerate() {
                    let meta = LoopMeta::new(index, key.as_str(), len);
                    output.push_str(&options.render_block_with_loop(item.clone(), meta)?);
                }
            }

            Value::Record(record) if !record.is_empty() => {
                let len = record.len();
                for (index, field) in record.fields().enumerate() {
                    let meta = LoopMeta::new(index, field.lookup_name(), len);
                    output.push_str(
                        &options.render_block_with_loop(field.value().clone(), meta)?,
                    );
                }
            }

            _ => output = options.render_inverse()?,
        }

        Ok(Value::String(output))
    }
}

/// Sends its arguments, joined by spaces, to the `log` facade
///
/// The level comes from `level=` or the engine's configured default.
pub struct LogHelper;

impl HelperDef for LogHelper {
    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        let level = match options.hash_value("level") {
            Some(value) => {
                let name = value.to_string();
                name.parse::<Level>().map_err(|_| {
                    Error::argument_mismatch(
                        options.name(),
                        format!("unknown log level '{}'", name),
                    )
                })?
            }
            None => options.engine().config().log_level(),
        };

        let message = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        log::log!(target: LOG_TARGET, level, "{}", message);

        Ok(Value::Null)
    }
}

/// Single-segment lookup of a key or index in a container
pub struct LookupHelper;

impl HelperDef for LookupHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any, ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        if options.is_block() {
            return Err(Error::argument_mismatch(
                options.name(),
                "cannot be used as a block",
            ));
        }

        let key = match arg(args, 1) {
            Value::String(key) => key.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(Error::argument_mismatch(
                    options.name(),
                    format!("key must be a string or number, got {}", other.kind()),
                ))
            }
        };

        Ok(arg(args, 0).lookup(&key))
    }
}

/// Structural equality of two values
///
/// As a block it renders the body when equal and `{{else}}` otherwise.
pub struct EqualHelper;

impl HelperDef for EqualHelper {
    fn signature(&self) -> Signature {
        Signature::exact(vec![ParamKind::Any, ParamKind::Any])
    }

    fn call(&self, args: &[Value], options: &mut Options<'_, '_>) -> Result<Value> {
        let equal = arg(args, 0) == arg(args, 1);

        if !options.is_block() {
            return Ok(Value::Bool(equal));
        }

        let output = if equal {
            options.render_block()?
        } else {
            options.render_inverse()?
        };
        Ok(Value::String(output))
    }
}
